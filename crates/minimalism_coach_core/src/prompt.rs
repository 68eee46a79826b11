//! crates/minimalism_coach_core/src/prompt.rs
//!
//! Prompt templates and the pure prompt assembler. The assembler takes an
//! explicit structured context rather than ad hoc strings so it can be tested
//! without a model in the loop.

use serde::{Deserialize, Serialize};

use crate::coaching::{Approach, CoachingMode, EmotionalState};
use crate::domain::{ChatEntry, Goal, Profile, Progress};

//=========================================================================================
// Templates
//=========================================================================================

pub const MINIMALISM_COACH_PROMPT: &str = "\
You are an expert extreme minimalism coach helping people achieve a 50-item lifestyle.
Your role is to provide psychological support, practical guidance, and decision-making help.

Key principles:
- Focus on the psychology behind attachment to objects
- Provide specific, actionable advice
- Use progressive phases: 500 -> 200 -> 100 -> 50 items
- Recognize emotional challenges and provide support
- Suggest multi-use alternatives for items

Conversation style: Supportive but direct, like a professional life coach.";

pub const ASSESSMENT_PROMPT: &str = "\
You are a compassionate minimalism assessment coach. Guide the user through an intake
conversation to understand their starting point, motivations, and blockers.

Assessment objectives:
- Welcome the user, explain the purpose of the assessment, and build trust.
- Ask targeted questions about current item counts, lifestyle, and living space.
- Surface emotional attachments, decision-making habits, and potential obstacles.
- Summarize the profile you gathered and recommend a focus phase.

Conversation style: Warm, curious, and methodical. Ask one focused question at a time.";

pub const DECISION_SUPPORT_PROMPT: &str = "\
You are a decisive minimalism coach specializing in keep-or-let-go decisions for specific
item categories.

Decision support priorities:
- Clarify the item or category under consideration.
- Probe for utility, emotional value, frequency of use, and available alternatives.
- Offer structured decision frameworks (one-in-one-out, 90-day rule, multi-use substitution).
- Provide concise keep/donate/store recommendations backed by reasoning.

Conversation style: Direct, encouraging, and action-oriented. One decision per exchange,
concluded with a clear next step.";

/// Selects the system template for an engagement mode.
pub fn template_for_mode(mode: CoachingMode) -> &'static str {
    match mode {
        CoachingMode::Assessment => ASSESSMENT_PROMPT,
        CoachingMode::Decision => DECISION_SUPPORT_PROMPT,
        CoachingMode::General | CoachingMode::Emergency => MINIMALISM_COACH_PROMPT,
    }
}

//=========================================================================================
// Structured Context
//=========================================================================================

/// Dashboard-computed context the client may send alongside a message.
/// Loosely typed by design: every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedContext {
    pub improvement_percent: Option<f64>,
    pub phase_label: Option<String>,
    pub lifestyle_label: Option<String>,
    pub preferred_approach: Option<String>,
    pub challenges: Vec<String>,
    pub metrics: ComputedMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedMetrics {
    pub start_items: Option<u32>,
    pub current_items: Option<u32>,
    pub target_items: Option<u32>,
}

/// Everything the prompt assembler needs for one exchange.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub profile: Option<Profile>,
    pub progress: Option<Progress>,
    pub goals: Vec<Goal>,
    pub recent_chat: Vec<ChatEntry>,
    pub computed: Option<ComputedContext>,
    pub mode: CoachingMode,
    pub approach: Option<Approach>,
    pub approach_directive: Option<&'static str>,
    pub emotion: Option<EmotionalState>,
    pub emotion_directive: Option<&'static str>,
    pub crisis: bool,
    /// Compact summary of the previous exchange, if any.
    pub session_context: Option<String>,
}

//=========================================================================================
// Assembly
//=========================================================================================

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Assembles the full prompt for one user message.
///
/// Pure function: same template, message, and context always produce the same
/// string. Sections are emitted only when the corresponding context exists.
pub fn build_prompt(template: &str, user_message: &str, ctx: &PromptContext) -> String {
    let mut prompt = format!("{template}\n\n");

    let metrics = ctx
        .computed
        .as_ref()
        .map(|computed| computed.metrics.clone())
        .unwrap_or_default();

    if ctx.profile.is_some() || ctx.computed.is_some() {
        let profile = ctx.profile.clone().unwrap_or_default();
        let computed = ctx.computed.clone().unwrap_or_default();

        let name = profile
            .name
            .clone()
            .or_else(|| profile.user_id.map(|id| id.to_string()))
            .unwrap_or_else(|| "Minimalism client".to_string());
        let phase = profile
            .phase
            .map(|phase| phase.to_string())
            .or_else(|| computed.phase_label.clone())
            .unwrap_or_else(|| "unspecified".to_string());
        let current_items = profile
            .current_items
            .or(metrics.current_items)
            .map(|count| count.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let target_items = profile
            .target_items
            .or(metrics.target_items)
            .map(|count| count.to_string())
            .unwrap_or_else(|| "50".to_string());
        let lifestyle = profile
            .lifestyle
            .clone()
            .or_else(|| computed.lifestyle_label.clone())
            .unwrap_or_else(|| "not provided".to_string());
        let motivation = profile
            .motivation
            .clone()
            .unwrap_or_else(|| "clarity and simplicity".to_string());
        let challenges = if profile.challenges.is_empty() {
            computed.challenges.clone()
        } else {
            profile.challenges.clone()
        };

        prompt.push_str(&format!(
            "User Profile: {name}, Phase: {phase}, Current Items: {current_items}, \
             Target: {target_items}, Lifestyle: {lifestyle}, Motivation: {motivation}"
        ));
        if !challenges.is_empty() {
            prompt.push_str(&format!(", Challenges: {}", challenges.join(", ")));
        }
        prompt.push('\n');
    }

    if let Some(progress) = &ctx.progress {
        let mut bits = vec![format!("{} milestones tracked", progress.milestones.len())];
        bits.push(format!("phase {}", progress.current_phase));
        if let Some(count) = progress.current_item_count.or(metrics.current_items) {
            bits.push(format!("current items {count}"));
        }
        if let Some(last_update) = progress.last_update {
            bits.push(format!("last update {}", last_update.to_rfc3339()));
        }
        prompt.push_str(&format!("Progress: {}\n", bits.join(", ")));
    }

    if let Some(computed) = &ctx.computed {
        let mut parts = Vec::new();
        if let Some(percent) = computed.improvement_percent {
            parts.push(format!("journey completion {percent}%"));
        }
        if let Some(start) = computed.metrics.start_items {
            parts.push(format!("started with {start} items"));
        }
        if let Some(current) = computed.metrics.current_items {
            parts.push(format!("currently {current} items"));
        }
        if let Some(target) = computed.metrics.target_items {
            parts.push(format!("target {target} items"));
        }
        if !parts.is_empty() {
            prompt.push_str(&format!("Journey Metrics: {}\n", parts.join(", ")));
        }
        if let Some(label) = &computed.phase_label {
            prompt.push_str(&format!("Dashboard Phase Label: {label}\n"));
        }
    }

    if !ctx.goals.is_empty() {
        let goals: Vec<&str> = ctx.goals.iter().map(|goal| goal.text.as_str()).collect();
        prompt.push_str(&format!("Goals: {}\n", goals.join("; ")));
    }

    if let (Some(approach), Some(directive)) = (ctx.approach, ctx.approach_directive) {
        prompt.push_str(&format!(
            "Preferred Coaching Approach: {}. {directive}\n",
            approach.label()
        ));
    }

    if let Some(directive) = ctx.emotion_directive {
        let label = ctx
            .emotion
            .map(EmotionalState::label)
            .unwrap_or("emotional context");
        prompt.push_str(&format!("Emotional Focus: {label}. {directive}\n"));
    }

    if ctx.crisis {
        prompt.push_str(
            "Crisis Protocol: Offer reassurance, ensure emotional safety, suggest one grounding \
             action, and invite them to reach out for extra support. Avoid overwhelming tasks.\n",
        );
    }

    if !ctx.recent_chat.is_empty() {
        let recent: Vec<String> = ctx
            .recent_chat
            .iter()
            .map(|entry| format!("{}: {}", entry.role, truncate_chars(&entry.content, 80)))
            .collect();
        prompt.push_str(&format!("Recent Conversation: {}\n", recent.join(" | ")));
    }

    prompt.push_str(&format!("Engagement Mode: {}\n", ctx.mode.label()));

    if let Some(session_context) = &ctx.session_context {
        if !session_context.is_empty() {
            prompt.push_str(&format!("Context: {session_context}\n"));
        }
    }

    prompt.push_str(&format!(
        "Human: {user_message}\n\nRespond as the minimalism coach:"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coaching;
    use crate::domain::Phase;

    #[test]
    fn bare_context_still_frames_the_exchange() {
        let prompt = build_prompt(
            MINIMALISM_COACH_PROMPT,
            "Where do I start?",
            &PromptContext::default(),
        );
        assert!(prompt.starts_with(MINIMALISM_COACH_PROMPT));
        assert!(prompt.contains("Engagement Mode: general"));
        assert!(prompt.ends_with("Respond as the minimalism coach:"));
        assert!(prompt.contains("Human: Where do I start?"));
        assert!(!prompt.contains("User Profile:"));
    }

    #[test]
    fn profile_and_progress_sections_are_rendered() {
        let mut progress = Progress::default();
        coaching::append_milestone(&mut progress, 180, "", "", chrono::Utc::now());

        let ctx = PromptContext {
            profile: Some(Profile {
                name: Some("Ada".to_string()),
                phase: Some(Phase::Refinement),
                current_items: Some(180),
                challenges: vec!["books".to_string(), "sentimental items".to_string()],
                ..Profile::default()
            }),
            progress: Some(progress),
            goals: vec![Goal {
                text: "under 100 by summer".to_string(),
                ..Goal::default()
            }],
            ..PromptContext::default()
        };

        let prompt = build_prompt(MINIMALISM_COACH_PROMPT, "help", &ctx);
        assert!(prompt.contains("User Profile: Ada, Phase: refinement, Current Items: 180"));
        assert!(prompt.contains("Challenges: books, sentimental items"));
        assert!(prompt.contains("1 milestones tracked"));
        assert!(prompt.contains("Goals: under 100 by summer"));
    }

    #[test]
    fn directives_and_crisis_protocol_are_included() {
        let snapshot = coaching::detect_emotional_state("I want to give up");
        let ctx = PromptContext {
            approach: Some(Approach::Supportive),
            approach_directive: Some(coaching::approach_directive(
                Approach::Supportive,
                snapshot.state,
            )),
            emotion: snapshot.state,
            emotion_directive: snapshot.directive,
            crisis: snapshot.crisis,
            ..PromptContext::default()
        };
        let prompt = build_prompt(MINIMALISM_COACH_PROMPT, "I want to give up", &ctx);
        assert!(prompt.contains("Preferred Coaching Approach: supportive."));
        assert!(prompt.contains("Emotional Focus: crisis."));
        assert!(prompt.contains("Crisis Protocol:"));
    }

    #[test]
    fn recent_chat_is_truncated_per_entry() {
        let ctx = PromptContext {
            recent_chat: vec![ChatEntry {
                role: "user".to_string(),
                content: "x".repeat(300),
                timestamp: None,
            }],
            ..PromptContext::default()
        };
        let prompt = build_prompt(MINIMALISM_COACH_PROMPT, "hi", &ctx);
        let line = prompt
            .lines()
            .find(|line| line.starts_with("Recent Conversation:"))
            .unwrap();
        assert!(line.len() < 120);
    }

    #[test]
    fn assembly_is_deterministic() {
        let ctx = PromptContext {
            computed: Some(ComputedContext {
                improvement_percent: Some(40.0),
                metrics: ComputedMetrics {
                    start_items: Some(500),
                    current_items: Some(300),
                    target_items: Some(50),
                },
                ..ComputedContext::default()
            }),
            ..PromptContext::default()
        };
        let a = build_prompt(MINIMALISM_COACH_PROMPT, "status?", &ctx);
        let b = build_prompt(MINIMALISM_COACH_PROMPT, "status?", &ctx);
        assert_eq!(a, b);
        assert!(a.contains("journey completion 40%"));
        assert!(a.contains("started with 500 items"));
    }
}
