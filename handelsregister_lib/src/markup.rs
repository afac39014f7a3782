//! Streaming tag/text tokenizer shared by the page extractors.
//!
//! Portal pages are loosely nested HTML. The scanner runs quick-xml in its
//! most lenient configuration and hands each start tag, text run, and end
//! tag to a [`MarkupHandler`] in document order. No tree is built; handlers
//! keep whatever state they need themselves.

use std::borrow::Cow;
use std::sync::OnceLock;

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};

/// An opening tag with lowercased name and attribute keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    name: String,
    attributes: Vec<(String, String)>,
}

impl StartTag {
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
        }
    }

    fn from_event(event: &BytesStart<'_>) -> Self {
        let attributes = event
            .html_attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
                let value = decode_entities(&String::from_utf8_lossy(&attr.value)).into_owned();
                (key, value)
            })
            .collect();
        Self {
            name: lowercase_name(event.name().as_ref()),
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the space-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

/// Receives the token stream of one page.
pub trait MarkupHandler {
    fn start_tag(&mut self, tag: &StartTag);
    /// Called for every text run, whitespace-only runs included. Entities
    /// are already decoded.
    fn text(&mut self, text: &str);
    fn end_tag(&mut self, name: &str);
}

/// A state machine that turns one page into one value.
///
/// `finish` returns `None` when the page did not have the expected shape;
/// extractors never report failure any other way.
pub trait Extractor: MarkupHandler {
    type Output;

    fn finish(self) -> Option<Self::Output>;

    /// Runs the extractor over a whole page.
    fn extract(mut self, html: &str) -> Option<Self::Output>
    where
        Self: Sized,
    {
        scan(html, &mut self);
        self.finish()
    }
}

/// Feeds every token of `html` to `handler`.
///
/// Script and style bodies are dropped before tokenizing. Malformed markup
/// is skipped; scanning stops only at end of input or when the reader can
/// no longer make progress.
pub fn scan<H: MarkupHandler + ?Sized>(html: &str, handler: &mut H) {
    let html = raw_text_pattern().replace_all(html, "");
    let mut reader = Reader::from_str(&html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.expand_empty_elements = true;
    config.check_comments = false;

    let mut stalled_at = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => handler.start_tag(&StartTag::from_event(&e)),
            Ok(Event::End(e)) => handler.end_tag(&lowercase_name(e.name().as_ref())),
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                handler.text(&decode_entities(&raw));
            }
            Ok(Event::CData(e)) => handler.text(&String::from_utf8_lossy(&e)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                let position = reader.buffer_position();
                if stalled_at == Some(position) {
                    tracing::debug!("Markup scanner stalled at byte {}: {}", position, err);
                    break;
                }
                tracing::debug!("Skipping malformed markup at byte {}: {}", position, err);
                stalled_at = Some(position);
            }
        }
    }
}

fn lowercase_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn raw_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>")
            .expect("raw text pattern compiles")
    })
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z][A-Za-z0-9]*);")
            .expect("entity pattern compiles")
    })
}

/// Decodes character references, leaving unknown ones and bare `&` as-is.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    entity_pattern().replace_all(raw, |caps: &Captures| {
        resolve_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
}

fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_html5_entity(entity).map(str::to_string)
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        tokens: Vec<String>,
    }

    impl MarkupHandler for Recorder {
        fn start_tag(&mut self, tag: &StartTag) {
            let attrs: Vec<String> = tag
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            self.tokens
                .push(format!("<{} {}>", tag.name(), attrs.join(" ")).replace(" >", ">"));
        }

        fn text(&mut self, text: &str) {
            if !text.trim().is_empty() {
                self.tokens.push(text.trim().to_string());
            }
        }

        fn end_tag(&mut self, name: &str) {
            self.tokens.push(format!("</{}>", name));
        }
    }

    fn tokens(html: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        scan(html, &mut recorder);
        recorder.tokens
    }

    #[test]
    fn names_and_keys_are_lowercased() {
        assert_eq!(
            tokens(r#"<TD CLASS="RegPortErg_AZ">x</TD>"#),
            vec!["<td class=RegPortErg_AZ>", "x", "</td>"]
        );
    }

    #[test]
    fn tolerates_unclosed_and_unquoted_markup() {
        let toks = tokens("<table><tr><td nowrap width=10>a<br>b</td></tr></table></div>");
        assert!(toks.contains(&"<td nowrap= width=10>".to_string()));
        assert!(toks.contains(&"a".to_string()));
        assert!(toks.contains(&"b".to_string()));
        assert_eq!(toks.last().map(String::as_str), Some("</div>"));
    }

    #[test]
    fn self_closing_tags_expand_to_start_and_end() {
        assert_eq!(tokens("<br/>"), vec!["<br>", "</br>"]);
    }

    #[test]
    fn scripts_are_skipped() {
        let toks = tokens("<p>a</p><script>if (x < 3) { y(); }</script><p>b</p>");
        assert_eq!(toks, vec!["<p>", "a", "</p>", "<p>", "b", "</p>"]);
    }

    #[test]
    fn entities_are_decoded_leniently() {
        assert_eq!(decode_entities("M&uuml;ller &amp; S&ouml;hne"), "Müller & Söhne");
        assert_eq!(decode_entities("L&#246;schdatum"), "Löschdatum");
        assert_eq!(decode_entities("&#x2013; Name"), "– Name");
        assert_eq!(decode_entities("A & B &bogus;"), "A & B &bogus;");
    }

    #[test]
    fn class_lookup_splits_on_whitespace() {
        let tag = StartTag::new("div", &[("class", "tree-node  selected")]);
        assert!(tag.has_class("tree-node"));
        assert!(tag.has_class("selected"));
        assert!(!tag.has_class("tree"));
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("  Liste der\n\t Gesellschafter "), "Liste der Gesellschafter");
    }
}
