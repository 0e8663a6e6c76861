//! Self-contained HTML error responses.

use serde::Serialize;

/// Everything known about a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDiagnostics {
    pub code: String,
    pub summary: String,
    pub method: String,
    pub request_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub resource_kind: String,
    pub stage: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

pub fn render_error_page(d: &ErrorDiagnostics) -> String {
    let json = serde_json::to_string(d)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c");

    let mut rows = String::new();
    let mut row = |label: &str, value: &str| {
        rows.push_str(&format!(
            "<dt>{}</dt><dd>{}</dd>",
            escape_html(label),
            escape_html(value)
        ));
    };
    row("Method", &d.method);
    row("Request", &d.request_url);
    if let Some(target) = &d.target {
        row("Target", target);
    }
    row("Resource", &d.resource_kind);
    row("Stage", &d.stage);
    if let Some(status) = d.upstream_status {
        row("Upstream status", &status.to_string());
    }

    let preview = d
        .preview
        .as_deref()
        .map(|p| format!("<h2>Response preview</h2><pre>{}</pre>", escape_html(p)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{code}</title></head>
<body>
<h1>{summary}</h1>
<p><code>{code}</code></p>
<pre>{error}</pre>
<dl>{rows}</dl>
{preview}
<script type="application/json" id="webrascal-error">{json}</script>
</body>
</html>
"#,
        code = escape_html(&d.code),
        summary = escape_html(&d.summary),
        error = escape_html(&d.error),
        rows = rows,
        preview = preview,
        json = json,
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
