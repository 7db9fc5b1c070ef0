use std::fmt;

/// Structured description of an edit. Formatting happens only when the
/// writer needs a comment string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditSummary {
    module: String,
    action: Option<String>,
    language: Option<String>,
    comment_args: Vec<String>,
    auto_summary_args: Vec<String>,
    user_summary: Option<String>,
}

impl EditSummary {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_comment_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_auto_summary_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_summary_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Blank summaries are treated as absent.
    pub fn with_user_summary(mut self, summary: Option<&str>) -> Self {
        self.user_summary = summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    /// `module-action`, or just `module` when there is no action.
    pub fn message_key(&self) -> String {
        match &self.action {
            Some(action) => format!("{}-{}", self.module, action),
            None => self.module.clone(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn comment_args(&self) -> &[String] {
        &self.comment_args
    }

    pub fn auto_summary_args(&self) -> &[String] {
        &self.auto_summary_args
    }

    pub fn user_summary(&self) -> Option<&str> {
        self.user_summary.as_deref()
    }

    /// `/* key:n|lang|arg1|arg2 */ auto1, auto2, user summary`
    pub fn format(&self) -> String {
        let mut out = format!(
            "/* {}:{}|{}",
            self.message_key(),
            self.auto_summary_args.len(),
            self.language.as_deref().unwrap_or("")
        );
        for arg in &self.comment_args {
            out.push('|');
            out.push_str(arg);
        }
        out.push_str(" */");

        let tail: Vec<&str> = self
            .auto_summary_args
            .iter()
            .map(String::as_str)
            .chain(self.user_summary.as_deref())
            .collect();
        if !tail.is_empty() {
            out.push(' ');
            out.push_str(&tail.join(", "));
        }
        out
    }
}

impl fmt::Display for EditSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_summary_format() {
        let summary = EditSummary::new("wbmergeitems")
            .with_action("from")
            .with_comment_args(["Q1"])
            .with_user_summary(Some("duplicate"));
        assert_eq!(summary.message_key(), "wbmergeitems-from");
        assert_eq!(summary.format(), "/* wbmergeitems-from:0||Q1 */ duplicate");
    }

    #[test]
    fn redirect_summary_format() {
        let summary = EditSummary::new("wbcreateredirect").with_comment_args(["Q1", "Q2"]);
        assert_eq!(summary.format(), "/* wbcreateredirect:0||Q1|Q2 */");
    }

    #[test]
    fn auto_args_precede_user_summary() {
        let summary = EditSummary::new("wbsetlabel")
            .with_action("set")
            .with_language("en")
            .with_auto_summary_args(["Berlin"])
            .with_user_summary(Some("  fix  "));
        assert_eq!(summary.format(), "/* wbsetlabel-set:1|en */ Berlin, fix");
    }

    #[test]
    fn blank_user_summary_is_dropped() {
        let summary = EditSummary::new("m").with_user_summary(Some("   "));
        assert_eq!(summary.user_summary(), None);
    }
}
