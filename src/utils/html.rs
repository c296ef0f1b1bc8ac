use ammonia::Builder;

/// Reduces client supplied free text (AI summaries, questionnaire feedback)
/// to plain, HTML-safe text before it is stored.
///
/// Every tag is removed, `<script>` and `<style>` together with their
/// content. Text without markup passes through unchanged; stray `<`, `>`
/// and `&` come back entity-escaped because the admin UI renders these
/// fields as HTML.
pub fn sanitize_text(input: &str) -> String {
    Builder::empty()
        .add_clean_content_tags(["script", "style"])
        .clean(input)
        .to_string()
}

/// Optional variant of [`sanitize_text`].
pub fn sanitize_opt(input: Option<&str>) -> Option<String> {
    input.map(sanitize_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        let text = "整体心理状态良好，可保持当前学习与生活节奏。";
        assert_eq!(sanitize_text(text), text);
    }

    #[test]
    fn tags_and_scripts_are_removed() {
        assert_eq!(
            sanitize_text("<b>注意</b><script>alert(1)</script>休息"),
            "注意休息"
        );
    }
}
