//! Human-oriented error page rendering.

use crate::http::{ResponseRecorder, StatusCode};

/// Fixed error page, parameterized only by the status code and its
/// reason phrase. Deliberately self-contained: no assets, no scripts,
/// nothing that could leak internal detail.
const ERROR_TEMPLATE: &str = "\
<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>{code}</title>
<style>
body { font-family: system-ui, sans-serif; color: #333; text-align: center; margin-top: 15vh; }
h1 { font-size: 4em; margin-bottom: 0; }
p { color: #777; }
</style>
</head>
<body>
<h1>{code}</h1>
<p>{reason}</p>
</body>
</html>
";

/// Replace the recording with the error page for `status`.
///
/// The page is terminal: whatever the handler recorded before failing
/// is discarded so the rendered status and body are authoritative.
pub(crate) fn render_error_page(recorder: &mut ResponseRecorder, status: StatusCode) {
    recorder.reset();
    recorder.set_header("Content-Type", "text/html");
    recorder.set_status(status);
    let page = ERROR_TEMPLATE
        .replace("{code}", &status.0.to_string())
        .replace("{reason}", status.reason());
    recorder.write_str(&page);
}
