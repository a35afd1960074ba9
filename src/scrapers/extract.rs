//! Helpers for reading named fields out of parsed markup.

use crate::error::{Result, ScrapeError};
use scraper::{ElementRef, Html, Selector};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| ScrapeError::InvalidSelector {
        selector: css.to_string(),
        reason: err.to_string(),
    })
}

/// Text content of an element with whitespace collapsed; `None` when empty
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text of the first element under `scope` matching `css`
pub fn text_in(scope: ElementRef<'_>, css: &str) -> Result<Option<String>> {
    let selector = selector(css)?;
    Ok(scope.select(&selector).next().and_then(element_text))
}

/// Text of the first element in the document matching `css`
pub fn text_in_document(document: &Html, css: &str) -> Result<Option<String>> {
    let selector = selector(css)?;
    Ok(document.select(&selector).next().and_then(element_text))
}

/// Read each `(field, css)` pair under `scope`, keeping absent fields as `None`.
///
/// A missing scope yields `None` for every field.
pub fn fields_in(
    scope: Option<ElementRef<'_>>,
    fields: &[(String, String)],
) -> Result<Vec<(String, Option<String>)>> {
    fields
        .iter()
        .map(|(name, css)| {
            let value = match scope {
                Some(scope) => text_in(scope, css)?,
                None => None,
            };
            Ok((name.clone(), value))
        })
        .collect()
}

/// First element in the document matching `css`
pub fn first<'a>(document: &'a Html, css: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = selector(css)?;
    Ok(document.select(&selector).next())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div id="box">
                <h1>  Cozy
                    studio </h1>
                <p class="price"><span>2 100</span> <span>zł</span></p>
                <p class="empty">   </p>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_text_is_whitespace_collapsed() {
        let document = Html::parse_document(PAGE);
        assert_eq!(text_in_document(&document, "h1").unwrap().as_deref(), Some("Cozy studio"));
        assert_eq!(text_in_document(&document, ".price").unwrap().as_deref(), Some("2 100 zł"));
        assert_eq!(text_in_document(&document, ".empty").unwrap(), None);
    }

    #[test]
    fn test_fields_default_to_none() {
        let document = Html::parse_document(PAGE);
        let scope = first(&document, "#box").unwrap();
        let fields = vec![
            ("title".to_string(), "h1".to_string()),
            ("deposit".to_string(), ".deposit".to_string()),
        ];

        let values = fields_in(scope, &fields).unwrap();
        assert_eq!(values[0], ("title".to_string(), Some("Cozy studio".to_string())));
        assert_eq!(values[1], ("deposit".to_string(), None));

        let missing = fields_in(None, &fields).unwrap();
        assert!(missing.iter().all(|(_, value)| value.is_none()));
    }

    #[test]
    fn test_bad_selector_is_reported() {
        assert!(matches!(selector("div[[["), Err(ScrapeError::InvalidSelector { .. })));
    }
}
