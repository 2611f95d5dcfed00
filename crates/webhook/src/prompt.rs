/// Phrase users say to reach the skill; it often leaks into the utterance.
pub const INVOCATION_PHRASE: &str = "Modo inteligente";

const INSTRUCTIONS: &str = "Responda como se estivesse conversando com um amigo de forma descontraída e divertida. \
Seja direto, claro e use um toque de bom humor quando fizer sentido. \
Evite ser muito formal. Evite jargões técnicos. \
Responda de forma leve e criativa, sem parecer um robô. \
Limite sua resposta a no máximo 500 caracteres. ";

/// Strip the invocation phrase (any ASCII casing) and surrounding whitespace.
pub fn clean_question(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase();
    let phrase = INVOCATION_PHRASE.to_ascii_lowercase();

    // ASCII lowercasing keeps byte offsets, so matches index into `raw` too
    let mut cleaned = String::with_capacity(raw.len());
    let mut rest = 0;
    for (start, _) in lowered.match_indices(&phrase) {
        cleaned.push_str(&raw[rest..start]);
        rest = start + phrase.len();
    }
    cleaned.push_str(&raw[rest..]);

    cleaned.trim().to_string()
}

/// Full prompt: behavioural instructions, optional history block, question.
pub fn build_prompt(context: &str, question: &str) -> String {
    if context.is_empty() {
        format!("{INSTRUCTIONS}Pergunta: {question}")
    } else {
        format!("{INSTRUCTIONS}\nHistórico da conversa:\n{context}Pergunta: {question}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_question_strips_invocation() {
        assert_eq!(clean_question("Modo inteligente qual a capital da frança"), "qual a capital da frança");
        assert_eq!(clean_question("modo inteligente  que horas são "), "que horas são");
        assert_eq!(clean_question("  Modo inteligente "), "");
        assert_eq!(clean_question("ação é ótima"), "ação é ótima");
    }

    #[test]
    fn test_prompt_without_history() {
        let prompt = build_prompt("", "qual a capital da frança");
        assert!(prompt.starts_with("Responda como se estivesse conversando"));
        assert!(prompt.ends_with("caracteres. Pergunta: qual a capital da frança"));
        assert!(!prompt.contains("Histórico"));
    }

    #[test]
    fn test_prompt_with_history() {
        let prompt = build_prompt("user: oi\nassistant: olá\n\n", "tudo bem?");
        assert!(prompt.contains("Histórico da conversa:\nuser: oi\nassistant: olá\n\nPergunta: tudo bem?"));
    }
}
