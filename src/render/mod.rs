//! HTML fragments for each region the viewer and the planner show.
//!
//! Every function here is pure: the same view model always renders the same
//! markup, and every piece of user or API supplied text goes through
//! [`escape_html`] before it is interpolated.

mod collection;
mod planner;

pub use collection::{render_collection, render_collection_error, EMPTY_COLLECTION};
pub use planner::{render_planner, render_signed_out, PlannerView, Viewer};

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}

/// A static inline message for a region that failed to load.
pub fn render_error(message: &str) -> String {
    format!(r#"<div class="muted error">{}</div>"#, escape_html(message))
}

#[cfg(test)]
mod tests {
    use super::{escape_html, render_error};

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(escape_html("Catan — 3-4 players"), "Catan — 3-4 players");
    }

    #[test]
    fn error_block_is_escaped() {
        assert_eq!(
            render_error("Error loading gamedays: <b>denied</b>"),
            r#"<div class="muted error">Error loading gamedays: &lt;b&gt;denied&lt;/b&gt;</div>"#
        );
    }
}
