use scraper::{Html, Selector};
use seeker_core::traits::ProfileExtractor;
use serde_json::{Map, Value};

/// Pulls public profile hints out of a page.
///
/// JSON bodies contribute their top-level scalar fields. HTML bodies
/// contribute OpenGraph and Twitter-card meta tags, the page title, the meta
/// description and the first JSON-LD block.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlProfileExtractor;

impl ProfileExtractor for HtmlProfileExtractor {
    fn extract(&self, body: &str) -> Option<Map<String, Value>> {
        let data = match serde_json::from_str::<Value>(body.trim()) {
            Ok(Value::Object(object)) => scalar_fields(object),
            _ => html_fields(body),
        };
        (!data.is_empty()).then_some(data)
    }
}

fn scalar_fields(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        .collect()
}

fn html_fields(body: &str) -> Map<String, Value> {
    let document = Html::parse_document(body);
    let mut data = Map::new();

    if let Ok(meta) = Selector::parse("meta[content]") {
        for element in document.select(&meta) {
            let el = element.value();
            let key = el.attr("property").or_else(|| el.attr("name"));
            let (Some(key), Some(content)) = (key, el.attr("content")) else {
                continue;
            };
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            if key.starts_with("og:") || key.starts_with("twitter:") {
                data.entry(key.to_string())
                    .or_insert_with(|| Value::String(content.to_string()));
            } else if key.eq_ignore_ascii_case("description") {
                data.entry("description")
                    .or_insert_with(|| Value::String(content.to_string()));
            }
        }
    }

    if let Some(title) = first_text(&document, "title") {
        data.insert("title".into(), Value::String(title));
    }

    if let Some(json_ld) = first_text(&document, r#"script[type="application/ld+json"]"#)
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
    {
        data.insert("json_ld".into(), json_ld);
    }

    data
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}
