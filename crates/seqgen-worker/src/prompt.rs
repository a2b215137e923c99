//! Prompt building.
//!
//! The first shot is described in full. Every later shot is a remix of the
//! shot before it, so its prompt only states what must stay the same and
//! which line of dialog changes.

use seqgen_models::Shot;

const SEPARATOR: &str = ". ";

/// Build the generation prompt for `shot` at 1-based `shot_number`.
///
/// `all_shots` is the full submitted list; blank fields of a continuation
/// shot fall back to the first shot's values.
pub fn build_prompt(shot: &Shot, shot_number: usize, all_shots: &[Shot]) -> String {
    if shot_number <= 1 {
        first_shot_prompt(shot)
    } else {
        let reference = all_shots.first().unwrap_or(shot);
        continuation_prompt(shot, reference)
    }
}

fn first_shot_prompt(shot: &Shot) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(characters) = shot.characters() {
        parts.push(characters.to_string());
    }
    if let Some(environment) = shot.environment() {
        parts.push(format!("in {}", environment));
    }
    if let Some(lighting) = shot.lighting() {
        parts.push(lighting.to_string());
    }
    if let Some(camera) = shot.camera_angles() {
        parts.push(camera.to_string());
    }
    if let Some(dialog) = shot.dialog() {
        parts.push(format!("'{}'", dialog));
    }
    if let Some(voice) = shot.voice() {
        parts.push(format!("Voice and microphone: {}", voice));
    }

    parts.join(SEPARATOR)
}

fn continuation_prompt(shot: &Shot, reference: &Shot) -> String {
    let characters = shot.characters().or_else(|| reference.characters());
    let environment = shot.environment().or_else(|| reference.environment());
    let lighting = shot.lighting().or_else(|| reference.lighting());
    let camera = shot.camera_angles().or_else(|| reference.camera_angles());
    let voice = shot.voice().or_else(|| reference.voice());

    let mut parts: Vec<String> = Vec::new();

    parts.push(match characters {
        Some(c) => format!("Keep the same character ({}) with the exact same appearance and clothing", c),
        None => "Keep the same characters with the exact same appearance and clothing".to_string(),
    });
    parts.push(match environment {
        Some(e) => format!("in the same setting: {}", e),
        None => "in the same setting".to_string(),
    });
    if let Some(lighting) = lighting {
        parts.push(format!("Keep the same lighting: {}", lighting));
    }
    if let Some(camera) = camera {
        parts.push(format!("Keep the same camera framing: {}", camera));
    }
    parts.push(match voice {
        Some(v) => format!("Use the same voice and microphone: {}", v),
        None => "Use the same voice and delivery as before".to_string(),
    });
    if let Some(dialog) = shot.dialog() {
        parts.push(format!("Keep everything else identical and only change the dialog to: '{}'", dialog));
    }
    parts.push("Preserve the same background audio and ambience".to_string());

    parts.join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_shot() -> Shot {
        Shot {
            characters: Some("A tall chef in a white apron".into()),
            environment: Some("a busy diner kitchen".into()),
            lighting: Some("warm tungsten light".into()),
            camera_angles: Some("medium close-up".into()),
            dialog: Some("Order up!".into()),
            voice: Some("gravelly voice, lavalier mic".into()),
        }
    }

    #[test]
    fn test_first_shot_order() {
        let prompt = build_prompt(&full_shot(), 1, &[full_shot()]);
        assert_eq!(
            prompt,
            "A tall chef in a white apron. in a busy diner kitchen. warm tungsten light. \
             medium close-up. 'Order up!'. Voice and microphone: gravelly voice, lavalier mic"
        );
    }

    #[test]
    fn test_first_shot_skips_blank_fields() {
        let shot = Shot {
            environment: Some("   ".into()),
            ..Shot::with_dialog("Hello")
        };
        let prompt = build_prompt(&shot, 1, &[shot.clone()]);
        assert_eq!(prompt, "'Hello'");
        assert!(!prompt.contains(". ."));
    }

    #[test]
    fn test_first_shot_never_uses_continuation_phrasing() {
        for count in 1..=3 {
            let shots = vec![full_shot(); count];
            let prompt = build_prompt(&shots[0], 1, &shots);
            assert!(!prompt.contains("the same"));
        }
    }

    #[test]
    fn test_continuation_shots_use_consistency_phrasing() {
        let shots = vec![full_shot(), Shot::with_dialog("Two"), Shot::with_dialog("Three")];
        for (i, shot) in shots.iter().enumerate().skip(1) {
            let prompt = build_prompt(shot, i + 1, &shots);
            assert!(prompt.contains("the same"));
            assert!(prompt.contains(&format!("only change the dialog to: '{}'", shot.dialog().unwrap())));
            assert!(prompt.contains("background audio"));
        }
    }

    #[test]
    fn test_blank_fields_fall_back_to_first_shot() {
        let first = full_shot();
        let second = Shot {
            lighting: Some("cold neon".into()),
            ..Shot::with_dialog("Two")
        };
        let shots = vec![first.clone(), second.clone()];
        let prompt = build_prompt(&second, 2, &shots);

        assert!(prompt.contains("A tall chef in a white apron"));
        assert!(prompt.contains("a busy diner kitchen"));
        assert!(prompt.contains("medium close-up"));
        assert!(prompt.contains("gravelly voice, lavalier mic"));
        assert!(prompt.contains("cold neon"));
        assert!(!prompt.contains("warm tungsten light"));
    }

    #[test]
    fn test_dialog_only_continuation_is_not_empty() {
        let shots = vec![Shot::with_dialog("One"), Shot::with_dialog("Two")];
        let prompt = build_prompt(&shots[1], 2, &shots);
        assert!(prompt.contains("same characters"));
        assert!(prompt.ends_with("Preserve the same background audio and ambience"));
    }

    #[test]
    fn test_standalone_remix_uses_own_fields() {
        let shots = vec![Shot {
            characters: Some("a robot".into()),
            ..Shot::with_dialog("Beep")
        }];
        let prompt = build_prompt(&shots[0], 2, &shots);
        assert!(prompt.contains("a robot"));
        assert!(prompt.contains("only change the dialog to: 'Beep'"));
    }
}
