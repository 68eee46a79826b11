//! crates/minimalism_coach_core/src/coaching.rs
//!
//! Pure coaching logic: engagement modes, coaching-approach and
//! emotional-state heuristics, per-request generation settings, and the
//! phase model that maps item counts to journey phases. Everything here is
//! deterministic and side-effect free so it can be tested without a model.

use chrono::{DateTime, Utc};

use crate::domain::{Milestone, Phase, Progress};

//=========================================================================================
// Engagement Modes
//=========================================================================================

/// How the client framed the conversation. Selects the prompt template and
/// shifts generation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoachingMode {
    #[default]
    General,
    Assessment,
    Decision,
    Emergency,
}

impl CoachingMode {
    /// Parses the free-form `mode` string clients send. Unknown values fall
    /// back to `General`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "assessment" => Self::Assessment,
            "decision" | "decision_support" | "decision-support" => Self::Decision,
            "emergency" => Self::Emergency,
            _ => Self::General,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Assessment => "assessment",
            Self::Decision => "decision",
            Self::Emergency => "emergency",
        }
    }
}

//=========================================================================================
// Coaching Approach
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Approach {
    #[default]
    Supportive,
    Direct,
    Question,
    Logical,
}

impl Approach {
    pub fn label(self) -> &'static str {
        match self {
            Self::Supportive => "supportive",
            Self::Direct => "direct",
            Self::Question => "question",
            Self::Logical => "logical",
        }
    }
}

const SUPPORTIVE_ALIASES: &[&str] = &["supportive", "gentle", "warm", "empathic"];
const DIRECT_ALIASES: &[&str] = &["direct", "challenging", "tough-love", "firm"];
const QUESTION_ALIASES: &[&str] = &["questions", "question", "inquiry", "coaching"];
const LOGICAL_ALIASES: &[&str] = &["logical", "rational", "analytical", "evidence"];

/// Maps a free-form preference string ("be gentle with me", "tough-love") to
/// an approach. Defaults to supportive.
pub fn normalize_approach(value: &str) -> Approach {
    let lower = value.to_lowercase();
    let contains_any = |aliases: &[&str]| aliases.iter().any(|alias| lower.contains(alias));

    if contains_any(SUPPORTIVE_ALIASES) {
        Approach::Supportive
    } else if contains_any(DIRECT_ALIASES) {
        Approach::Direct
    } else if contains_any(QUESTION_ALIASES) {
        Approach::Question
    } else if contains_any(LOGICAL_ALIASES) {
        Approach::Logical
    } else {
        Approach::Supportive
    }
}

/// Picks the coaching approach for a message: mode first, then an explicit
/// profile or computed preference, then message heuristics.
pub fn determine_approach(
    message: &str,
    mode: CoachingMode,
    profile_preference: Option<&str>,
    computed_preference: Option<&str>,
) -> Approach {
    match mode {
        CoachingMode::Assessment => return Approach::Question,
        CoachingMode::Decision => return Approach::Direct,
        _ => {}
    }

    if let Some(preference) = profile_preference {
        return normalize_approach(preference);
    }
    if let Some(preference) = computed_preference {
        return normalize_approach(preference);
    }

    let text = message.to_lowercase();

    if text.contains("hold me accountable") || text.contains("push me") || text.contains("challenge")
    {
        return Approach::Direct;
    }
    if text.contains('?') {
        return Approach::Question;
    }
    if text.contains("data")
        || text.contains("metrics")
        || text.contains("numbers")
        || text.contains("plan")
    {
        return Approach::Logical;
    }

    Approach::Supportive
}

/// The per-approach directive appended to the prompt.
pub fn approach_directive(approach: Approach, state: Option<EmotionalState>) -> &'static str {
    match approach {
        Approach::Direct => {
            "Adopt a firm, accountability-driven tone. Give clear directives, set deadlines, and \
             highlight consequences of inaction."
        }
        Approach::Question => {
            "Use a Socratic coaching style. Ask up to two focused questions before offering a \
             concise recommendation."
        }
        Approach::Logical => {
            "Lean on logical reasoning, data points, and cost-benefit framing. Minimize emotional \
             language unless needed to validate."
        }
        Approach::Supportive => {
            if state == Some(EmotionalState::Resistance) {
                "Stay gentle but confident. Normalize setbacks and co-create a very small next \
                 action to regain momentum."
            } else {
                "Lead with empathy and validation. Offer encouragement and break guidance into \
                 manageable steps."
            }
        }
    }
}

//=========================================================================================
// Emotional-State Detection
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionalState {
    Overwhelm,
    Resistance,
    Excitement,
    Celebration,
    Crisis,
}

impl EmotionalState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Overwhelm => "overwhelm",
            Self::Resistance => "resistance",
            Self::Excitement => "excitement",
            Self::Celebration => "celebration",
            Self::Crisis => "crisis",
        }
    }
}

/// The result of scanning a message for emotional keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionalSnapshot {
    pub state: Option<EmotionalState>,
    pub directive: Option<&'static str>,
    pub crisis: bool,
}

const CRISIS_KEYWORDS: &[&str] = &[
    "give up",
    "quit",
    "can't go on",
    "done with this",
    "hopeless",
    "panic",
    "breakdown",
];

const OVERWHELM_KEYWORDS: &[&str] = &[
    "overwhelmed",
    "stressed",
    "anxious",
    "burned out",
    "burnt out",
    "too much",
    "can't handle",
    "exhausted",
];

const RESISTANCE_KEYWORDS: &[&str] =
    &["stuck", "resistant", "don't want", "refuse", "annoyed", "frustrated"];

const EXCITEMENT_KEYWORDS: &[&str] = &["excited", "motivated", "energized", "pumped", "ready"];

const CELEBRATION_KEYWORDS: &[&str] = &["celebrate", "proud", "happy", "win", "milestone"];

/// Scans a message for emotional cues. Crisis keywords short-circuit
/// everything else.
pub fn detect_emotional_state(message: &str) -> EmotionalSnapshot {
    let lower = message.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|keyword| lower.contains(keyword));

    if matches(CRISIS_KEYWORDS) {
        return EmotionalSnapshot {
            state: Some(EmotionalState::Crisis),
            directive: Some(
                "User is in crisis or considering quitting. Respond with grounding, validation, \
                 and immediate micro-steps. Encourage a short break, breathing exercise, and \
                 remind them of previous wins.",
            ),
            crisis: true,
        };
    }

    let detected = if matches(OVERWHELM_KEYWORDS) {
        Some((
            EmotionalState::Overwhelm,
            "User feels overwhelmed. Slow the pace, validate feelings, and offer one tiny \
             actionable next step.",
        ))
    } else if matches(RESISTANCE_KEYWORDS) {
        Some((
            EmotionalState::Resistance,
            "User shows resistance. Explore the root gently, acknowledge the challenge, and \
             negotiate a low-friction action.",
        ))
    } else if matches(EXCITEMENT_KEYWORDS) {
        Some((
            EmotionalState::Excitement,
            "User is excited. Celebrate the momentum and channel it into a concrete milestone or \
             stretch goal.",
        ))
    } else if matches(CELEBRATION_KEYWORDS) {
        Some((
            EmotionalState::Celebration,
            "User is celebrating. Mirror their enthusiasm, highlight progress, and suggest a way \
             to lock in the win.",
        ))
    } else {
        None
    };

    match detected {
        Some((state, directive)) => EmotionalSnapshot {
            state: Some(state),
            directive: Some(directive),
            crisis: false,
        },
        None => EmotionalSnapshot::default(),
    }
}

//=========================================================================================
// Generation Settings
//=========================================================================================

/// Sampling parameters handed to the model adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// Tunes sampling for the mode, approach, and emotional context.
pub fn generation_settings(
    mode: CoachingMode,
    approach: Approach,
    state: Option<EmotionalState>,
    crisis: bool,
) -> GenerationSettings {
    let (mut temperature, mut max_tokens): (f32, u32) = match mode {
        CoachingMode::Assessment => (0.6, 220),
        CoachingMode::Decision => (0.55, 170),
        CoachingMode::Emergency => (0.5, 210),
        CoachingMode::General => (0.63, 190),
    };
    let mut top_p: f32 = 0.9;

    match approach {
        Approach::Direct => {
            temperature -= 0.05;
            top_p = 0.88;
        }
        Approach::Question => {
            temperature += 0.05;
            top_p = 0.92;
        }
        Approach::Logical => {
            temperature = (temperature - 0.08).max(0.5);
            top_p = 0.87;
        }
        Approach::Supportive => {}
    }

    match state {
        Some(EmotionalState::Overwhelm) => {
            temperature = (temperature - 0.05).max(0.5);
            max_tokens += 20;
        }
        Some(EmotionalState::Excitement) | Some(EmotionalState::Celebration) => {
            temperature = (temperature + 0.05).min(0.75);
        }
        _ => {}
    }

    if crisis {
        temperature = 0.45;
        top_p = 0.85;
        max_tokens = max_tokens.max(220);
    }

    GenerationSettings {
        temperature: (temperature * 100.0).round() / 100.0,
        max_tokens,
        top_p: (top_p * 100.0).round() / 100.0,
    }
}

//=========================================================================================
// Phase Model
//=========================================================================================

/// Maps an item count onto the journey phase ladder
/// (500 → 200 → 100 → 50 items).
pub fn phase_for_item_count(item_count: u32) -> Phase {
    if item_count > 500 {
        Phase::Initial
    } else if item_count > 200 {
        Phase::Reduction
    } else if item_count > 100 {
        Phase::Refinement
    } else if item_count > 50 {
        Phase::Optimization
    } else {
        Phase::Maintenance
    }
}

/// Assessment recommendations for a phase, most actionable first.
pub fn recommendations_for_phase(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Initial => &[
            "Start with obvious duplicates (multiple phone chargers, excess clothing)",
            "Focus on expired or broken items first",
            "Tackle one room at a time to avoid overwhelm",
        ],
        Phase::Reduction => &[
            "Apply the \"one year rule\" - if unused for a year, consider removing",
            "Look for multi-use alternatives (phone as camera, clock, etc.)",
            "Focus on emotional attachments - address the psychology behind keeping items",
        ],
        Phase::Refinement => &[
            "Evaluate each item's frequency of use and emotional value",
            "Consider quality over quantity for remaining items",
            "Start thinking about your ideal 50-item list",
        ],
        Phase::Optimization => &[
            "Make hard choices about sentimental items",
            "Optimize for absolute essentials and joy-bringing items",
            "Create your final 50-item list and stick to it",
        ],
        Phase::Maintenance => &[
            "Maintain your 50-item lifestyle with mindful consumption",
            "Share your journey to inspire others",
            "Focus on experiences over possessions",
        ],
    }
}

pub fn estimated_timeframe(phase: Phase) -> &'static str {
    match phase {
        Phase::Initial | Phase::Refinement => "2-3 months",
        Phase::Reduction => "3-4 months",
        Phase::Optimization => "1-2 months",
        Phase::Maintenance => "Ongoing",
    }
}

/// Target item count for an assessment: 50 in maintenance, otherwise a 40%
/// cut floored at 50.
pub fn target_item_count(phase: Phase, current_items: u32) -> u32 {
    if phase == Phase::Maintenance {
        50
    } else {
        ((current_items as f64 * 0.6).floor() as u32).max(50)
    }
}

//=========================================================================================
// Milestones
//=========================================================================================

/// Appends a milestone to the progress log and refreshes the derived fields.
///
/// `improvement` is the previous milestone's item count minus the new one;
/// zero for the first milestone, negative for a regression.
pub fn append_milestone(
    progress: &mut Progress,
    item_count: u32,
    label: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> Milestone {
    let improvement = progress
        .milestones
        .last()
        .map(|previous| previous.item_count as i64 - item_count as i64)
        .unwrap_or(0);

    let label = if label.is_empty() {
        format!("Reached {item_count} items")
    } else {
        label.to_string()
    };

    let milestone = Milestone {
        item_count,
        date: now,
        label,
        notes: notes.to_string(),
        improvement,
    };

    progress.milestones.push(milestone.clone());
    progress.last_update = Some(now);
    progress.current_item_count = Some(item_count);
    progress.current_phase = phase_for_item_count(item_count);
    milestone
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ladder_matches_thresholds() {
        assert_eq!(phase_for_item_count(501), Phase::Initial);
        assert_eq!(phase_for_item_count(500), Phase::Reduction);
        assert_eq!(phase_for_item_count(201), Phase::Reduction);
        assert_eq!(phase_for_item_count(200), Phase::Refinement);
        assert_eq!(phase_for_item_count(101), Phase::Refinement);
        assert_eq!(phase_for_item_count(100), Phase::Optimization);
        assert_eq!(phase_for_item_count(51), Phase::Optimization);
        assert_eq!(phase_for_item_count(50), Phase::Maintenance);
        assert_eq!(phase_for_item_count(1), Phase::Maintenance);
    }

    #[test]
    fn first_milestone_has_zero_improvement() {
        let mut progress = Progress::default();
        let milestone = append_milestone(&mut progress, 200, "", "", Utc::now());
        assert_eq!(milestone.improvement, 0);
        assert_eq!(milestone.label, "Reached 200 items");
        assert_eq!(progress.current_item_count, Some(200));
        assert_eq!(progress.current_phase, Phase::Refinement);
    }

    #[test]
    fn improvement_is_previous_minus_new() {
        let mut progress = Progress::default();
        append_milestone(&mut progress, 200, "", "", Utc::now());
        let second = append_milestone(&mut progress, 150, "", "", Utc::now());
        assert_eq!(second.improvement, 50);
        assert_eq!(progress.milestones.len(), 2);
    }

    #[test]
    fn regression_yields_negative_improvement() {
        let mut progress = Progress::default();
        append_milestone(&mut progress, 150, "", "", Utc::now());
        let relapse = append_milestone(&mut progress, 180, "bought things", "", Utc::now());
        assert_eq!(relapse.improvement, -30);
    }

    #[test]
    fn mode_parsing_accepts_aliases() {
        assert_eq!(CoachingMode::parse("Assessment"), CoachingMode::Assessment);
        assert_eq!(CoachingMode::parse("decision_support"), CoachingMode::Decision);
        assert_eq!(CoachingMode::parse("decision-support"), CoachingMode::Decision);
        assert_eq!(CoachingMode::parse("anything else"), CoachingMode::General);
    }

    #[test]
    fn crisis_keywords_override_other_states() {
        let snapshot = detect_emotional_state("I'm so stressed I want to give up");
        assert!(snapshot.crisis);
        assert_eq!(snapshot.state, Some(EmotionalState::Crisis));
    }

    #[test]
    fn overwhelm_is_detected_with_directive() {
        let snapshot = detect_emotional_state("I feel completely overwhelmed by my closet");
        assert_eq!(snapshot.state, Some(EmotionalState::Overwhelm));
        assert!(snapshot.directive.is_some());
        assert!(!snapshot.crisis);
    }

    #[test]
    fn mode_wins_approach_selection() {
        assert_eq!(
            determine_approach("whatever", CoachingMode::Assessment, Some("direct"), None),
            Approach::Question
        );
        assert_eq!(
            determine_approach("whatever", CoachingMode::Decision, None, None),
            Approach::Direct
        );
    }

    #[test]
    fn profile_preference_beats_message_heuristics() {
        assert_eq!(
            determine_approach(
                "show me the numbers",
                CoachingMode::General,
                Some("be gentle"),
                None
            ),
            Approach::Supportive
        );
    }

    #[test]
    fn message_heuristics_apply_without_preference() {
        assert_eq!(
            determine_approach("push me harder", CoachingMode::General, None, None),
            Approach::Direct
        );
        assert_eq!(
            determine_approach("should I keep this?", CoachingMode::General, None, None),
            Approach::Question
        );
        assert_eq!(
            determine_approach(
                "give me the metrics on my plan",
                CoachingMode::General,
                None,
                None
            ),
            Approach::Logical
        );
    }

    #[test]
    fn crisis_pins_generation_settings() {
        let settings =
            generation_settings(CoachingMode::General, Approach::Supportive, None, true);
        assert_eq!(settings.temperature, 0.45);
        assert_eq!(settings.top_p, 0.85);
        assert!(settings.max_tokens >= 220);
    }

    #[test]
    fn decision_mode_runs_cooler_than_general() {
        let decision =
            generation_settings(CoachingMode::Decision, Approach::Supportive, None, false);
        let general =
            generation_settings(CoachingMode::General, Approach::Supportive, None, false);
        assert!(decision.temperature < general.temperature);
    }

    #[test]
    fn target_counts_floor_at_fifty() {
        assert_eq!(target_item_count(Phase::Maintenance, 30), 50);
        assert_eq!(target_item_count(Phase::Reduction, 400), 240);
        assert_eq!(target_item_count(Phase::Optimization, 60), 50);
    }
}
