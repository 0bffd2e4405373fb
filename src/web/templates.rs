//! HTML templates for the upload page.

use crate::config::Config;

/// Outcome banner shown above the form
pub enum Notice<'a> {
    Success(&'a str),
    Failure(&'a str),
}

/// Render the main page
pub fn render_upload_page(config: &Config, notice: Option<Notice<'_>>, has_preview: bool) -> String {
    let notice_html = match notice {
        Some(Notice::Success(msg)) => format!(r#"<div class="alert">{}</div>"#, html_escape(msg)),
        Some(Notice::Failure(msg)) => {
            format!(r#"<div class="alert error">{}</div>"#, html_escape(msg))
        }
        None => String::new(),
    };

    let current = config
        .background_image
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|name| html_escape(&name.to_string_lossy()))
        .unwrap_or_else(|| "brak (jednolite tło)".to_string());

    let preview_html = if has_preview {
        r#"<img class="preview" src="/background/preview.png" alt="podgląd tła" width="400" height="300">"#
    } else {
        ""
    };

    let mode = match config.brightness_mode {
        crate::image_proc::BrightnessMode::Normalize => "wyrównanie",
        crate::image_proc::BrightnessMode::Amplify => "wzmocnienie",
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="pl">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Papierek</title>
    <style>
        * {{ box-sizing: border-box; }}
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 520px; margin: 0 auto; background: white; padding: 24px; border-radius: 12px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; margin-top: 0; }}
        .status {{ background: #e3f2fd; padding: 16px; border-radius: 8px; margin-bottom: 20px; font-size: 14px; }}
        .alert {{ background: #c8e6c9; padding: 12px; border-radius: 8px; margin-bottom: 16px; color: #2e7d32; }}
        .alert.error {{ background: #ffcdd2; color: #c62828; }}
        input[type=file] {{ width: 100%; padding: 10px; margin: 6px 0 16px; border: 1px solid #ddd; border-radius: 8px; }}
        button {{ padding: 12px 20px; border: none; border-radius: 8px; font-size: 15px; cursor: pointer; background: #2196F3; color: white; }}
        button.secondary {{ background: #9e9e9e; }}
        .preview {{ display: block; max-width: 100%; height: auto; margin: 16px 0; border: 1px solid #ddd; image-rendering: pixelated; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Papierek</h1>
    {notice_html}
    <div class="status">
        Tło: <b>{current}</b><br>
        Jasność: {mode}, dithering: {dither}, odświeżanie co {every} min
    </div>
    {preview_html}
    <form action="/background" method="post" enctype="multipart/form-data">
        <input type="file" name="file" accept="image/*" required>
        <button type="submit">Wgraj tło</button>
    </form>
    <form action="/background/clear" method="post" style="margin-top: 12px">
        <button class="secondary" type="submit">Usuń tło</button>
    </form>
</div>
</body>
</html>"##,
        notice_html = notice_html,
        current = current,
        mode = mode,
        dither = if config.dither { "tak" } else { "nie" },
        every = config.display_every_min,
        preview_html = preview_html,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_page_escapes_notice() {
        let page = render_upload_page(
            &Config::default(),
            Some(Notice::Failure("<script>")),
            false,
        );
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("alert error"));
        assert!(!page.contains("preview.png"));
    }

    #[test]
    fn test_page_names_current_background() {
        let config = Config {
            background_image: Some(PathBuf::from("/opt/papierek/uploads/bg_uploaded.jpg")),
            ..Default::default()
        };
        let page = render_upload_page(&config, None, true);
        assert!(page.contains("bg_uploaded.jpg"));
        assert!(page.contains("/background/preview.png"));
    }
}
