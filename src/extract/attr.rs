use crate::page::{NodeId, Page};

/// Default alt text some pipelines stamp on every image; carries no meaning.
const ALT_PLACEHOLDER: &str = "画像";

/// Text from element attributes for elements with no usable text node at the
/// cursor: `title`, then `alt`, then the selected option's label, then the
/// value of single-line text inputs. First non-empty match wins.
pub fn attribute_text(page: &Page, id: NodeId) -> Option<String> {
    // Frames have their own extraction path.
    if page.is_frame(id) {
        return None;
    }

    if let Some(title) = page.attr(id, "title") {
        if !title.trim().is_empty() {
            return Some(title.to_string());
        }
    }

    if let Some(alt) = page.attr(id, "alt") {
        if !alt.trim().is_empty() && alt != ALT_PLACEHOLDER {
            return Some(alt.to_string());
        }
    }

    match page.tag(id).map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("option") => {
            let label = page.text_content(id);
            if !label.is_empty() {
                return Some(label);
            }
        }
        Some("select") => {
            if let Some(label) = selected_option_text(page, id) {
                return Some(label);
            }
        }
        Some("input") | Some("textarea") => {
            let kind = page.attr(id, "type").unwrap_or("text");
            if kind == "text" || kind == "textarea" {
                if let Some(value) = page.attr(id, "value") {
                    if !value.trim().is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
        _ => {}
    }

    None
}

fn selected_option_text(page: &Page, select: NodeId) -> Option<String> {
    let options: Vec<NodeId> = page
        .children(select)
        .iter()
        .copied()
        .filter(|&c| page.tag(c).map(|t| t.eq_ignore_ascii_case("option")).unwrap_or(false))
        .collect();
    let chosen = options
        .iter()
        .copied()
        .find(|&o| page.attr(o, "selected").is_some())
        .or_else(|| options.first().copied())?;
    let label = page.text_content(chosen);
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_wins_over_alt() {
        let mut page = Page::new(100.0, 100.0);
        let img = page.add_element(page.root(), "img", None);
        page.set_attr(img, "title", "a landmark");
        page.set_attr(img, "alt", "photo");
        assert_eq!(attribute_text(&page, img).as_deref(), Some("a landmark"));
    }

    #[test]
    fn placeholder_alt_is_ignored() {
        let mut page = Page::new(100.0, 100.0);
        let img = page.add_element(page.root(), "img", None);
        page.set_attr(img, "alt", ALT_PLACEHOLDER);
        assert_eq!(attribute_text(&page, img), None);
    }

    #[test]
    fn select_prefers_selected_option() {
        let mut page = Page::new(100.0, 100.0);
        let select = page.add_element(page.root(), "select", None);
        let first = page.add_element(select, "option", None);
        page.add_text(first, "first", None);
        let second = page.add_element(select, "option", None);
        page.add_text(second, "second", None);
        page.set_attr(second, "selected", "true");
        assert_eq!(attribute_text(&page, select).as_deref(), Some("second"));
    }

    #[test]
    fn text_input_value_is_used() {
        let mut page = Page::new(100.0, 100.0);
        let input = page.add_element(page.root(), "input", None);
        page.set_attr(input, "type", "text");
        page.set_attr(input, "value", "typed words");
        assert_eq!(attribute_text(&page, input).as_deref(), Some("typed words"));
    }

    #[test]
    fn non_text_input_is_skipped() {
        let mut page = Page::new(100.0, 100.0);
        let input = page.add_element(page.root(), "input", None);
        page.set_attr(input, "type", "checkbox");
        page.set_attr(input, "value", "on");
        assert_eq!(attribute_text(&page, input), None);
    }

    #[test]
    fn frames_are_skipped() {
        let mut page = Page::new(100.0, 100.0);
        let frame = page.add_element(page.root(), "iframe", None);
        page.set_attr(frame, "title", "embedded");
        assert_eq!(attribute_text(&page, frame), None);
    }
}
