//! Auto-refreshing HTML overview of all gates

use std::fmt::Write;

use crate::controller::GateStatus;

const REFRESH_SECONDS: u32 = 5;

const STYLE: &str = r#"
        body { font-family: sans-serif; padding: 20px; background-color: #f4f4f4; }
        h1 { text-align: center; color: #333; }
        .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 20px; }
        .card { background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .header { display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px; }
        .badge { padding: 5px 10px; border-radius: 4px; font-weight: bold; color: white; }
        .healthy { background-color: #2ecc71; }
        .failing { background-color: #e74c3c; }
        .meta { font-size: 13px; color: #666; line-height: 1.6; }
        code { background: #eee; padding: 2px 4px; border-radius: 3px; }
"#;

/// Escape text for HTML element and attribute content
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

fn render_card(out: &mut String, gate: &GateStatus) {
    let (class, label) = if gate.healthy {
        ("healthy", "HEALTHY")
    } else {
        ("failing", "FAILING")
    };
    let _ = write!(
        out,
        r#"
        <div class="card">
            <div class="header">
                <strong>{name}</strong>
                <span class="badge {class}">{label}</span>
            </div>
            <div class="meta">
                Target: <code>{target}</code> ({check_type})<br>
                Last Check: {last_check}<br>
                Status: {message}
            </div>
        </div>"#,
        name = escape_html(&gate.name),
        target = escape_html(&gate.target),
        check_type = escape_html(&gate.check_type),
        last_check = gate.last_check.format("%H:%M:%S"),
        message = escape_html(&gate.message),
    );
}

/// Render the page for gates already sorted by name
pub fn render_status_page(gates: &[GateStatus]) -> String {
    let mut cards = String::new();
    for gate in gates {
        render_card(&mut cards, gate);
    }
    if gates.is_empty() {
        cards.push_str("\n        <p>No gates have been probed yet.</p>");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Readiness Gates</title>
    <meta http-equiv="refresh" content="{REFRESH_SECONDS}">
    <style>{STYLE}</style>
</head>
<body>
    <h1>Active Gates</h1>
    <div class="grid">{cards}
    </div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn gate(name: &str, healthy: bool) -> GateStatus {
        GateStatus {
            name: name.to_string(),
            target: "http://web/healthz?a=1&b=2".to_string(),
            check_type: "http".to_string(),
            healthy,
            last_check: Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap(),
            duration_ms: 3,
            message: if healthy { "Gate Open" } else { "Gate Closed" }.to_string(),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_page_renders_cards() {
        let page = render_status_page(&[gate("api", true), gate("<db>", false)]);

        assert!(page.contains(r#"<meta http-equiv="refresh" content="5">"#));
        assert!(page.contains("HEALTHY"));
        assert!(page.contains("FAILING"));
        assert!(page.contains("&lt;db&gt;"));
        assert!(!page.contains("<db>"));
        assert!(page.contains("http://web/healthz?a=1&amp;b=2"));
        assert!(page.contains("Last Check: 13:04:05"));
        assert!(page.find("api").unwrap() < page.find("&lt;db&gt;").unwrap());
    }

    #[test]
    fn test_empty_page() {
        assert!(render_status_page(&[]).contains("No gates have been probed yet."));
    }
}
