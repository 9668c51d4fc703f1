//! Prompt templates for the two LLM-backed jobs: per-user extraction and
//! per-(tag, feature) consolidation.

const DEFAULT_UPDATE_TEMPLATE: &str = "Extract profile updates as a JSON object whose values are \
commands of shape {{command, feature, value, tag, author}} with command in add|update|delete, from:\n\n{history}";

const DEFAULT_CONSOLIDATION_TEMPLATE: &str = "Consolidate the following profile values for the same \
tag/feature into a smaller, non-redundant JSON array of strings:\n\n{values}";

/// The two prompt templates the profile extraction/consolidation jobs
/// substitute into before calling the language model.
#[derive(Debug, Clone)]
pub struct ProfilePrompt {
    update_template: String,
    consolidation_template: String,
}

impl ProfilePrompt {
    /// Construct a prompt set from explicit templates.
    #[must_use]
    pub fn new(update_template: impl Into<String>, consolidation_template: impl Into<String>) -> Self {
        Self {
            update_template: update_template.into(),
            consolidation_template: consolidation_template.into(),
        }
    }

    /// Render the extraction prompt for one user's uningested history,
    /// joined by newlines into `{history}`.
    #[must_use]
    pub fn update_prompt(&self, history: &[String]) -> String {
        self.update_template.replace("{history}", &history.join("\n"))
    }

    /// Render the consolidation prompt for one (tag, feature) group's
    /// values, joined by newlines into `{values}`.
    #[must_use]
    pub fn consolidation_prompt(&self, values: &[String]) -> String {
        self.consolidation_template.replace("{values}", &values.join("\n"))
    }
}

impl Default for ProfilePrompt {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_TEMPLATE, DEFAULT_CONSOLIDATION_TEMPLATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_prompt_substitutes_history() {
        let prompt = ProfilePrompt::default();
        let rendered = prompt.update_prompt(&["User sends 'hi'".to_string()]);
        assert!(rendered.contains("User sends 'hi'"));
    }

    #[test]
    fn consolidation_prompt_substitutes_values() {
        let prompt = ProfilePrompt::default();
        let rendered = prompt.consolidation_prompt(&["a".to_string(), "b".to_string()]);
        assert!(rendered.contains("a\nb"));
    }
}
