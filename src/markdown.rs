//! Converts commit message bodies to HTML. Commit messages are loosely
//! Markdown (bullet lists, emphasis, code spans), so we run them through
//! [`pulldown_cmark`] with a couple of adjustments; see [`EventConverter`].

use pulldown_cmark::escape::escape_html;
use pulldown_cmark::{html, Event, Options, Parser, Tag};

/// Converts `markdown` to HTML, appending the result to `w`.
pub fn to_html(w: &mut String, markdown: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    html::push_html(
        w,
        Parser::new_ext(markdown, options).map(EventConverter::convert),
    );
}

/// Escapes `text` for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // writing into a `String` can't fail
    let _ = escape_html(&mut escaped, text);
    escaped
}

struct EventConverter;

impl EventConverter {
    fn convert_tag(tag: Tag) -> Tag {
        match tag {
            // The post template owns the h1 (post title) and the renderer
            // emits h2 section headings, so `#` in a commit message becomes
            // h3.
            Tag::Heading(level) => Tag::Heading((level + 2).min(6)),
            _ => tag,
        }
    }

    fn convert(ev: Event) -> Event {
        match ev {
            Event::Start(tag) => Event::Start(Self::convert_tag(tag)),
            Event::End(tag) => Event::End(Self::convert_tag(tag)),

            // Commit messages are untrusted input. Raw HTML is shown as text
            // rather than passed through.
            Event::Html(raw) => Event::Text(raw),
            _ => ev,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown);
        out
    }

    #[test]
    fn test_list() {
        assert_eq!(
            "<ul>\n<li>arrow keys</li>\n<li>history</li>\n</ul>\n",
            render("- arrow keys\n- history")
        );
    }

    #[test]
    fn test_headings_are_demoted() {
        assert_eq!("<h3>Notes</h3>\n", render("# Notes"));
        assert_eq!("<h6>Deep</h6>\n", render("##### Deep"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let out = render("<script>alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_escape() {
        assert_eq!("a &lt;b&gt; &amp; &quot;c&quot;", escape("a <b> & \"c\""));
    }

    #[test]
    fn test_empty() {
        assert_eq!("", render(""));
    }
}
