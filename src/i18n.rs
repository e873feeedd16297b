//! Localized strings surfaced by the conversation view

use serde::{Deserialize, Serialize};

/// Supported UI languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Locale {
    /// English
    #[default]
    #[serde(rename = "en")]
    En,
    /// Yiddish
    #[serde(rename = "yi")]
    Yi,
}

impl Locale {
    /// Whether text runs right-to-left
    pub fn is_rtl(&self) -> bool {
        matches!(self, Locale::Yi)
    }

    /// Strings for this locale
    pub fn strings(&self) -> &'static Strings {
        match self {
            Locale::En => &EN,
            Locale::Yi => &YI,
        }
    }
}

/// Fixed UI strings
#[derive(Debug)]
pub struct Strings {
    /// Shown next to the counterparty's name while they type
    pub typing: &'static str,
    /// Suffix on edited messages
    pub edited: &'static str,
    /// Long-press menu title
    pub message_options: &'static str,
    /// Long-press menu prompt
    pub choose_action: &'static str,
    /// Edit action
    pub edit: &'static str,
    /// Delete action
    pub delete: &'static str,
    /// Cancel action
    pub cancel: &'static str,
    /// Delete prompt title
    pub delete_message: &'static str,
    /// Delete prompt body
    pub delete_confirmation: &'static str,
    /// Footer while an older page loads
    pub loading: &'static str,
}

static EN: Strings = Strings {
    typing: "Typing...",
    edited: "(edited)",
    message_options: "Message Options",
    choose_action: "Choose an action",
    edit: "Edit",
    delete: "Delete",
    cancel: "Cancel",
    delete_message: "Delete Message",
    delete_confirmation: "Are you sure you want to delete this message?",
    loading: "Loading...",
};

static YI: Strings = Strings {
    typing: "שרײַבט...",
    edited: "(רעדאַקטירט)",
    message_options: "מעסעדזש אָפּציעס",
    choose_action: "קלײַבט אַן אַקציע",
    edit: "רעדאַקטירן",
    delete: "אויסמעקן",
    cancel: "אָפּזאָגן",
    delete_message: "אויסמעקן מעסעדזש",
    delete_confirmation: "זענט איר זיכער אַז איר ווילט אויסמעקן דעם מעסעדזש?",
    loading: "לאָדט...",
};
