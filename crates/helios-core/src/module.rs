//! Closed registry of insight modules.
//!
//! Each innovation-showcase widget on the platform maps to exactly one
//! `ModuleKind` variant carrying its system prompt, user-prompt builder, and
//! fallback payload builder. The set is fixed at compile time; requests are
//! normalized against it case-insensitively.
//!
//! | id                | widget                          |
//! |-------------------|---------------------------------|
//! | `ai-dashboard`    | AI operations dashboard         |
//! | `market-intel`    | market intelligence panel       |
//! | `iot-telemetry`   | IoT sensor dashboard            |
//! | `project-viewer`  | 3D project viewer               |
//! | `chat-concierge`  | AI chat assistant               |
//! | `energy-forecast` | demand/load forecast card       |
//! | `sustainability`  | emissions and ESG summary       |
//! | `expert-connect`  | experts and field-services match|

use crate::envelope::{FallbackPayload, InsightContext};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All modules, in wire-id order. Used by the gateway's catalog endpoint.
pub const MODULES: [ModuleKind; 8] = [
    ModuleKind::AiDashboard,
    ModuleKind::MarketIntel,
    ModuleKind::IotTelemetry,
    ModuleKind::ProjectViewer,
    ModuleKind::ChatConcierge,
    ModuleKind::EnergyForecast,
    ModuleKind::Sustainability,
    ModuleKind::ExpertConnect,
];

/// Raised when a request names a module outside the closed set, or passes a
/// non-string value. The gateway surfaces this as HTTP 400.
#[derive(Debug)]
pub struct UnknownModule(pub String);

impl fmt::Display for UnknownModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown module: {}", self.0)
    }
}

impl std::error::Error for UnknownModule {}

/// One insight request category. Immutable, defined at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    AiDashboard,
    MarketIntel,
    IotTelemetry,
    ProjectViewer,
    ChatConcierge,
    EnergyForecast,
    Sustainability,
    ExpertConnect,
}

const RESPONSE_CONTRACT: &str = "Respond with a single JSON object and nothing else: \
{\"summary\": string, \"highlights\": string[], \"actions\": string[], \"metadata\": object}. \
Keep the summary to two sentences, highlights to short phrases, and actions imperative.";

impl ModuleKind {
    /// Canonical wire id (lowercase, hyphenated).
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::AiDashboard => "ai-dashboard",
            ModuleKind::MarketIntel => "market-intel",
            ModuleKind::IotTelemetry => "iot-telemetry",
            ModuleKind::ProjectViewer => "project-viewer",
            ModuleKind::ChatConcierge => "chat-concierge",
            ModuleKind::EnergyForecast => "energy-forecast",
            ModuleKind::Sustainability => "sustainability",
            ModuleKind::ExpertConnect => "expert-connect",
        }
    }

    /// Human-readable widget name for catalogs and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::AiDashboard => "AI Operations Dashboard",
            ModuleKind::MarketIntel => "Market Intelligence",
            ModuleKind::IotTelemetry => "IoT Telemetry",
            ModuleKind::ProjectViewer => "Project Viewer",
            ModuleKind::ChatConcierge => "Energy Concierge",
            ModuleKind::EnergyForecast => "Energy Forecast",
            ModuleKind::Sustainability => "Sustainability Report",
            ModuleKind::ExpertConnect => "Expert Connect",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        MODULES.iter().copied().find(|m| m.as_str() == id)
    }

    /// Normalizes a raw request value into a module id. Only JSON strings are
    /// accepted; matching is case-insensitive and whitespace-tolerant. No side
    /// effects and no partial processing on failure.
    pub fn normalize(value: &serde_json::Value) -> Result<Self, UnknownModule> {
        let raw = value
            .as_str()
            .ok_or_else(|| UnknownModule(format!("expected string, got {}", json_type_name(value))))?;
        let id = raw.trim().to_lowercase();
        Self::from_id(&id).ok_or(UnknownModule(id))
    }

    /// System prompt sent to the upstream service for this module.
    pub fn system_prompt(&self) -> String {
        let persona = match self {
            ModuleKind::AiDashboard => {
                "You are the insight engine behind the AI operations dashboard of an \
                 energy-services platform. You summarize grid and facility analytics for \
                 operations managers."
            }
            ModuleKind::MarketIntel => {
                "You are the market-intelligence analyst for an energy-services platform. \
                 You brief commercial teams on wholesale power and fuel markets."
            }
            ModuleKind::IotTelemetry => {
                "You are the telemetry analyst for a fleet of IoT sensors across \
                 substations and customer sites. You turn sensor readings into findings."
            }
            ModuleKind::ProjectViewer => {
                "You are the project narrator for a 3D infrastructure-project viewer. \
                 You describe build progress and engineering milestones."
            }
            ModuleKind::ChatConcierge => {
                "You are the customer concierge for an energy-services company. You answer \
                 questions about solutions, services, and getting started."
            }
            ModuleKind::EnergyForecast => {
                "You are the demand forecaster for an energy-services platform. You explain \
                 load and generation outlooks in plain operational language."
            }
            ModuleKind::Sustainability => {
                "You are the sustainability reporter for an energy-services company. You \
                 summarize emissions, renewables mix, and ESG progress."
            }
            ModuleKind::ExpertConnect => {
                "You are the staffing matcher for an energy-services expert directory. You \
                 recommend specialists and field crews for a stated need."
            }
        };
        format!("{} {}", persona, RESPONSE_CONTRACT)
    }

    /// Renders the user prompt from the caller's context, defaulting missing
    /// fields. The full context map is appended so extra keys reach the model.
    pub fn build_user_prompt(&self, ctx: &InsightContext) -> String {
        let mut prompt = match self {
            ModuleKind::AiDashboard => format!(
                "Generate an operations insight for the metric \"{}\" at {}. \
                 Include two short highlights and three recommended actions.",
                ctx_str(ctx, "metric", "grid performance"),
                ctx_str(ctx, "location", "the service territory"),
            ),
            ModuleKind::MarketIntel => format!(
                "Brief the commercial team on the {} power market over a {} horizon.",
                ctx_str(ctx, "region", "ERCOT"),
                ctx_str(ctx, "horizon", "30-day"),
            ),
            ModuleKind::IotTelemetry => format!(
                "Summarize the latest {} readings for {} and flag anything drifting.",
                ctx_str(ctx, "sensor", "temperature and vibration"),
                ctx_str(ctx, "site", "Substation 7"),
            ),
            ModuleKind::ProjectViewer => format!(
                "Describe current progress on {} for a stakeholder walkthrough.",
                ctx_str(ctx, "project", "the Westbrook Solar Array"),
            ),
            ModuleKind::ChatConcierge => format!(
                "Answer a visitor asking about {} and suggest next steps with our team.",
                ctx_str(ctx, "topic", "our energy solutions"),
            ),
            ModuleKind::EnergyForecast => format!(
                "Produce a {} demand outlook for {} with drivers and risks.",
                ctx_str(ctx, "horizon", "7-day"),
                ctx_str(ctx, "region", "the service territory"),
            ),
            ModuleKind::Sustainability => format!(
                "Summarize sustainability performance for {} including emissions trend \
                 and renewables share.",
                ctx_str(ctx, "period", "this quarter"),
            ),
            ModuleKind::ExpertConnect => format!(
                "Recommend specialists for a client need in {} and how to engage them.",
                ctx_str(ctx, "specialty", "grid modernization"),
            ),
        };
        if !ctx.is_empty() {
            prompt.push_str("\n\nCaller context: ");
            prompt.push_str(&serde_json::Value::Object(ctx.clone()).to_string());
        }
        prompt
    }

    /// Static fallback payload for this module, with context fields
    /// interpolated. Always two highlights and three actions.
    pub fn fallback_payload(&self, ctx: &InsightContext) -> FallbackPayload {
        match self {
            ModuleKind::AiDashboard => {
                let metric = ctx_str(ctx, "metric", "grid performance");
                let location = ctx_str(ctx, "location", "the service territory");
                FallbackPayload {
                    summary: format!("Using cached analytics for {} in {}.", metric, location),
                    highlights: vec![
                        format!("{} is tracking within seasonal norms for {}.", capitalize(&metric), location),
                        "Sensor coverage holding at 98% across monitored substations.".to_string(),
                    ],
                    actions: vec![
                        "Review demand-response schedules for the next peak window.".to_string(),
                        "Rebalance feeder loads ahead of the evening ramp.".to_string(),
                        "Schedule a technician sweep for any offline sensors.".to_string(),
                    ],
                }
            }
            ModuleKind::MarketIntel => {
                let region = ctx_str(ctx, "region", "ERCOT");
                FallbackPayload {
                    summary: format!("Showing archived market intelligence for {}.", region),
                    highlights: vec![
                        format!("Day-ahead prices in {} have stayed inside the 30-day band.", region),
                        "Gas forwards are flat week over week.".to_string(),
                    ],
                    actions: vec![
                        "Revisit hedge ratios before the next trading window.".to_string(),
                        "Compare indexed and fixed offers for renewing accounts.".to_string(),
                        "Flag customers exposed to real-time pricing spikes.".to_string(),
                    ],
                }
            }
            ModuleKind::IotTelemetry => {
                let site = ctx_str(ctx, "site", "Substation 7");
                FallbackPayload {
                    summary: format!(
                        "Live telemetry is unavailable; presenting the last verified snapshot for {}.",
                        site
                    ),
                    highlights: vec![
                        format!("All monitored feeders at {} reported nominal at last sync.", site),
                        "Transformer temperatures held below alert thresholds.".to_string(),
                    ],
                    actions: vec![
                        "Confirm sensor gateway connectivity at the site.".to_string(),
                        "Re-run the telemetry sync once the uplink recovers.".to_string(),
                        "Log the outage window for the maintenance report.".to_string(),
                    ],
                }
            }
            ModuleKind::ProjectViewer => {
                let project = ctx_str(ctx, "project", "the Westbrook Solar Array");
                FallbackPayload {
                    summary: format!(
                        "Project walkthrough served from the local model library for {}.",
                        project
                    ),
                    highlights: vec![
                        format!("{} remains on its published construction timeline.", capitalize(&project)),
                        "Latest site survey is reflected in the 3D model.".to_string(),
                    ],
                    actions: vec![
                        "Open the viewer to inspect recent milestone markers.".to_string(),
                        "Request the monthly progress packet from the project office.".to_string(),
                        "Book a guided walkthrough with the delivery team.".to_string(),
                    ],
                }
            }
            ModuleKind::ChatConcierge => {
                let topic = ctx_str(ctx, "topic", "our energy solutions");
                FallbackPayload {
                    summary: format!(
                        "Our concierge is momentarily offline; here are curated answers about {}.",
                        topic
                    ),
                    highlights: vec![
                        "Commercial, industrial, and municipal programs are available.".to_string(),
                        "Most engagements begin with a no-cost energy assessment.".to_string(),
                    ],
                    actions: vec![
                        "Browse the solutions catalog for program details.".to_string(),
                        "Request an assessment through the contact form.".to_string(),
                        "Leave a callback number for a specialist follow-up.".to_string(),
                    ],
                }
            }
            ModuleKind::EnergyForecast => {
                let horizon = ctx_str(ctx, "horizon", "7-day");
                let region = ctx_str(ctx, "region", "the service territory");
                FallbackPayload {
                    summary: format!(
                        "Displaying the most recent {} forecast on file for {}.",
                        horizon, region
                    ),
                    highlights: vec![
                        format!("Peak demand across {} projects near seasonal averages.", region),
                        "No extreme-weather load events in the stored outlook.".to_string(),
                    ],
                    actions: vec![
                        "Refresh the forecast when the upstream feed recovers.".to_string(),
                        "Pre-stage demand-response capacity for the peak day.".to_string(),
                        "Share the outlook with scheduling before the ramp.".to_string(),
                    ],
                }
            }
            ModuleKind::Sustainability => {
                let period = ctx_str(ctx, "period", "this quarter");
                FallbackPayload {
                    summary: format!(
                        "Sustainability figures shown from the latest published report for {}.",
                        period
                    ),
                    highlights: vec![
                        "Portfolio emissions intensity continues its year-over-year decline.".to_string(),
                        "Renewables share of delivered energy reached a program high.".to_string(),
                    ],
                    actions: vec![
                        "Download the full ESG report from the news section.".to_string(),
                        "Review site-level reduction targets with facilities.".to_string(),
                        "Nominate projects for the next reporting cycle.".to_string(),
                    ],
                }
            }
            ModuleKind::ExpertConnect => {
                let specialty = ctx_str(ctx, "specialty", "grid modernization");
                FallbackPayload {
                    summary: format!(
                        "Matching from our resident expert directory for {}.",
                        specialty
                    ),
                    highlights: vec![
                        format!("Senior engineers with {} delivery experience are on staff.", specialty),
                        "Field crews are dispatchable across the service territory.".to_string(),
                    ],
                    actions: vec![
                        "Review expert profiles on the team page.".to_string(),
                        "Submit a scoping request with your project timeline.".to_string(),
                        "Schedule an introductory call with the practice lead.".to_string(),
                    ],
                }
            }
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context field as a string, defaulted when missing, non-string, or blank.
fn ctx_str(ctx: &InsightContext, key: &str, default: &str) -> String {
    ctx.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
