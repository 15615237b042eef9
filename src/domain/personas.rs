//! Static persona registry shared by the writer and visualizer pipelines.
//!
//! Personas are not persisted. A post references its persona only through
//! `ai_writer`, which carries the persona's full name as free text.

/// Persona key used when the operator does not choose one.
pub const DEFAULT_PERSONA_KEY: &str = "cipher";

/// Visual style applied when a post's writer matches no known persona.
pub const DEFAULT_VISUAL_STYLE: &str = "desaturated teal and amber palette, \
    CRT phosphor glow, drifting static, anonymous silhouettes in a data haze";

/// A named writing identity with fixed tone, category and model preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub key: &'static str,
    pub full_name: &'static str,
    pub category: &'static str,
    pub tone: &'static str,
    pub instructions: &'static str,
    pub model: &'static str,
}

pub const PERSONAS: &[Persona] = &[
    Persona {
        key: "cipher",
        full_name: "Cipher Vance",
        category: "Security",
        tone: "clipped, paranoid, precise",
        instructions: "You are Cipher Vance, a burned-out intrusion analyst who \
            writes field notes from the edge of the network. Favour short \
            declarative sentences, concrete technical detail and a dry sense \
            of dread. Never moralise; report what the logs show.",
        model: "gemini-2.0-flash",
    },
    Persona {
        key: "nova",
        full_name: "Nova Reyes",
        category: "Culture",
        tone: "warm, lyrical, wry",
        instructions: "You are Nova Reyes, a cultural critic documenting how \
            people live with machines. Write in vivid scenes, quote invented \
            bystanders, and end on an image rather than a conclusion.",
        model: "gemini-2.0-flash",
    },
    Persona {
        key: "atlas",
        full_name: "Atlas Okafor",
        category: "Economy",
        tone: "measured, data-driven, sceptical",
        instructions: "You are Atlas Okafor, a market correspondent covering \
            automated economies. Anchor every claim in a (fictional) figure, \
            explain second-order effects, and keep a sceptical distance from \
            hype.",
        model: "gemini-1.5-pro",
    },
    Persona {
        key: "echo",
        full_name: "Echo Lindqvist",
        category: "Science",
        tone: "curious, patient, quietly unsettling",
        instructions: "You are Echo Lindqvist, a science writer reporting from \
            labs that should not exist. Explain mechanisms plainly, admit \
            uncertainty, and let one detail feel slightly wrong.",
        model: "gemini-1.5-flash",
    },
];

/// Visual-director styles keyed by persona full name.
const VISUAL_STYLES: &[(&str, &str)] = &[
    (
        "Cipher Vance",
        "monochrome green terminal palette, cold server-room light, \
         cascading hex dumps, redacted documents, heavy scanlines",
    ),
    (
        "Nova Reyes",
        "magenta and cyan neon wash, rain-slick streets, crowd silhouettes, \
         chromatic aberration, film grain",
    ),
    (
        "Atlas Okafor",
        "muted gold and slate palette, brutalist trading floors, ticker \
         light trails, long shadows, data-mosh artefacts",
    ),
    (
        "Echo Lindqvist",
        "clinical white and ultraviolet palette, sterile laboratory glass, \
         floating specimens, interference bands, soft bloom",
    ),
];

/// Look up a persona by its short key (case-insensitive).
pub fn find(key: &str) -> Option<&'static Persona> {
    let key = key.trim();
    PERSONAS
        .iter()
        .find(|persona| persona.key.eq_ignore_ascii_case(key))
}

/// Look up a persona by the full name recorded on a post.
pub fn find_by_full_name(full_name: &str) -> Option<&'static Persona> {
    let name = full_name.trim();
    PERSONAS
        .iter()
        .find(|persona| persona.full_name.eq_ignore_ascii_case(name))
}

/// All valid persona keys, in registry order.
pub fn keys() -> Vec<&'static str> {
    PERSONAS.iter().map(|persona| persona.key).collect()
}

/// Visual style for a writer name; unknown writers get [`DEFAULT_VISUAL_STYLE`].
pub fn visual_style(full_name: &str) -> &'static str {
    let name = full_name.trim();
    VISUAL_STYLES
        .iter()
        .find(|(writer, _)| writer.eq_ignore_ascii_case(name))
        .map(|(_, style)| *style)
        .unwrap_or(DEFAULT_VISUAL_STYLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_resolves() {
        let persona = find(DEFAULT_PERSONA_KEY).expect("default persona");
        assert_eq!(persona.key, DEFAULT_PERSONA_KEY);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find("NOVA").map(|p| p.full_name), Some("Nova Reyes"));
        assert_eq!(
            find_by_full_name("atlas okafor").map(|p| p.key),
            Some("atlas")
        );
        assert!(find("ghost").is_none());
    }

    #[test]
    fn every_persona_has_a_visual_style() {
        for persona in PERSONAS {
            assert_ne!(visual_style(persona.full_name), DEFAULT_VISUAL_STYLE);
        }
        assert_eq!(visual_style("Unknown Writer"), DEFAULT_VISUAL_STYLE);
    }

    #[test]
    fn keys_are_unique() {
        let mut keys = keys();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), PERSONAS.len());
    }
}
