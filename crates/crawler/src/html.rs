use scraper::{Html, Selector};

/// Extract readable text from HTML by removing script, style, nav, footer,
/// and header elements, then collapsing whitespace.
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let remove_selectors = [
        "script", "style", "nav", "footer", "header", "noscript", "svg", "aside",
    ];

    let mut skip_ids = std::collections::HashSet::new();
    for sel_str in &remove_selectors {
        if let Ok(selector) = Selector::parse(sel_str) {
            for element in document.select(&selector) {
                skip_ids.insert(element.id());
            }
        }
    }

    let mut text_parts = Vec::new();
    for node in document.tree.nodes() {
        let mut should_skip = false;
        let mut check_id = Some(node.id());
        while let Some(id) = check_id {
            if skip_ids.contains(&id) {
                should_skip = true;
                break;
            }
            check_id = document
                .tree
                .get(id)
                .and_then(|n| n.parent())
                .map(|p| p.id());
        }

        if should_skip {
            continue;
        }

        if let Some(text) = node.value().as_text() {
            let trimmed = text.text.trim();
            if !trimmed.is_empty() {
                text_parts.push(trimmed.to_string());
            }
        }
    }

    collapse_whitespace(&text_parts.join(" "))
}

/// Extract the document's `<title>` text, if present.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(c);
            prev_was_space = false;
        }
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title() {
        let html = "<html><head><title>My Post</title></head><body></body></html>";
        assert_eq!(extract_title(html), Some("My Post".to_string()));
    }

    #[test]
    fn strips_boilerplate_elements() {
        let html = r#"
            <html>
            <body>
                <nav>Navigation here</nav>
                <main>
                    <h1>Article Title</h1>
                    <p>This is the main content.</p>
                </main>
                <footer>Footer content</footer>
                <script>alert('bad');</script>
            </body>
            </html>
        "#;
        let text = extract_readable_text(html);
        assert!(text.contains("Article Title"));
        assert!(text.contains("This is the main content."));
        assert!(!text.contains("Navigation"));
        assert!(!text.contains("Footer content"));
        assert!(!text.contains("alert"));
    }

    #[test]
    fn empty_body_yields_empty_text() {
        let html = "<html><body><script>x()</script></body></html>";
        assert_eq!(extract_readable_text(html), "");
    }
}
