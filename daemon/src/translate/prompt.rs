//! Prompt template for translation-only output

/// Build the instruction sent to the model for one translation
pub fn build_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following text from {source_lang} to {target_lang}. \
         Output ONLY the translation, nothing else. No explanation, no quotes, no extra text.\n\n\
         Text: {text}"
    )
}
