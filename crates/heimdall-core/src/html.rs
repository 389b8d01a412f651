//! HTML fragments.
//!
//! [`Html`] is markup that is ready to be written to a client verbatim. It is
//! built either from trusted markup ([`Html::raw`]) or from untrusted text
//! ([`Html::text`], which escapes). Anything that can render itself to an
//! [`Html`] implements [`IntoHtml`]; rendering happens exactly once, at the
//! point the content is handed to the dispatcher or the broker.

use std::fmt;

use serde::Serialize;

/// A rendered HTML fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Html(String);

impl Html {
    /// Wrap trusted markup without escaping.
    pub fn raw(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    /// Escape untrusted text into a fragment.
    pub fn text(text: &str) -> Self {
        Self(escape(text))
    }

    /// An empty fragment.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Append another fragment.
    #[must_use]
    pub fn append(mut self, other: impl IntoHtml) -> Self {
        self.0.push_str(other.into_html().as_str());
        self
    }

    /// Borrow the markup.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the fragment contains no markup at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the markup.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Html {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content that renders to an [`Html`] fragment.
///
/// Plain strings are treated as trusted markup; wrap untrusted text with
/// [`Html::text`] before handing it over.
pub trait IntoHtml {
    /// Render into a fragment.
    fn into_html(self) -> Html;
}

impl IntoHtml for Html {
    fn into_html(self) -> Html {
        self
    }
}

impl IntoHtml for &Html {
    fn into_html(self) -> Html {
        self.clone()
    }
}

impl IntoHtml for String {
    fn into_html(self) -> Html {
        Html(self)
    }
}

impl IntoHtml for &str {
    fn into_html(self) -> Html {
        Html(self.to_owned())
    }
}

/// Escape `&`, `<`, `>`, `"` and `'` for use in element text or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn text_escapes_markup() {
        let h = Html::text("<b>\"Tom\" & 'Jerry'</b>");
        assert_eq!(
            h.as_str(),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn raw_is_verbatim() {
        assert_eq!(Html::raw("<p>hi</p>").as_str(), "<p>hi</p>");
    }

    #[test]
    fn append_concatenates() {
        let h = Html::raw("<ul>")
            .append(Html::raw("<li>"))
            .append(Html::text("a<b"))
            .append("</li></ul>");
        assert_eq!(h.as_str(), "<ul><li>a&lt;b</li></ul>");
    }

    #[test]
    fn empty_is_empty() {
        assert!(Html::empty().is_empty());
        assert!(!Html::raw(" ").is_empty());
    }

    proptest! {
        #[test]
        fn escaped_text_has_no_raw_angle_brackets(s in ".*") {
            let h = Html::text(&s);
            prop_assert!(!h.as_str().contains('<'));
            prop_assert!(!h.as_str().contains('>'));
        }
    }
}
