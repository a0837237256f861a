/// Dashboard keyboard actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    FocusSearch,
    ClearSearch,
}

/// The parts of a `keydown` event the dashboard looks at.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPress<'a> {
    pub key: &'a str,
    pub ctrl: bool,
    pub meta: bool,
    /// Lower-cased tag name of the event target, if any.
    pub target_tag: Option<&'a str>,
}

fn is_text_entry(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("textarea")
}

/// Ctrl/Cmd+K focuses search and Escape clears it; nothing fires while typing.
pub fn shortcut_for(press: &KeyPress) -> Option<Shortcut> {
    if press.target_tag.is_some_and(is_text_entry) {
        return None;
    }
    let key = press.key.to_lowercase();
    if (press.ctrl || press.meta) && key == "k" {
        return Some(Shortcut::FocusSearch);
    }
    if key == "escape" {
        return Some(Shortcut::ClearSearch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str) -> KeyPress<'_> {
        KeyPress {
            key,
            ..Default::default()
        }
    }

    #[test]
    fn test_focus_search_with_either_modifier() {
        let ctrl = KeyPress { ctrl: true, ..press("k") };
        let meta = KeyPress { meta: true, ..press("K") };
        assert_eq!(shortcut_for(&ctrl), Some(Shortcut::FocusSearch));
        assert_eq!(shortcut_for(&meta), Some(Shortcut::FocusSearch));
        assert_eq!(shortcut_for(&press("k")), None);
    }

    #[test]
    fn test_escape_clears_search() {
        assert_eq!(shortcut_for(&press("Escape")), Some(Shortcut::ClearSearch));
    }

    #[test]
    fn test_ignored_inside_text_entry() {
        let in_input = KeyPress {
            ctrl: true,
            target_tag: Some("input"),
            ..press("k")
        };
        let in_textarea = KeyPress {
            target_tag: Some("TEXTAREA"),
            ..press("Escape")
        };
        assert_eq!(shortcut_for(&in_input), None);
        assert_eq!(shortcut_for(&in_textarea), None);

        let on_div = KeyPress {
            target_tag: Some("div"),
            ..press("Escape")
        };
        assert_eq!(shortcut_for(&on_div), Some(Shortcut::ClearSearch));
    }
}
