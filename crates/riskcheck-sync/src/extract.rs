//! Stateless text mining over filing documents.
//!
//! The catalog is a fixed, data-driven table of pattern groups evaluated by
//! one generic loop: each group names a catalyst category, its regex
//! alternatives, how to pick a title, whether a date fragment is captured,
//! and whether past-dated mentions apply. Matching uses fresh
//! `captures_iter` iterators per invocation, so no match cursor survives
//! between calls.

use std::collections::HashSet;

use regex::Regex;
use riskcheck_core::{CalendarDate, CatalystEventType, ExtractedCatalyst};

use crate::dates::parse_date_fragment;

/// Shared date alternation spliced into date-capturing patterns in place of
/// the `<DATE>` token. Kept in lockstep with `dates::parse_date_fragment`.
const DATE_FRAGMENT: &str = r"(?:(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec)\.?\s+\d{1,2},?\s+\d{4}|\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2}|Q[1-4]\s+\d{4})";

/// How a group derives an event title from its matched span.
#[derive(Debug, Clone, Copy)]
enum TitleRule {
    Fixed(&'static str),
    /// First keyword found in the matched span wins; otherwise the default.
    Keyword {
        default: &'static str,
        overrides: &'static [(&'static str, &'static str)],
    },
}

impl TitleRule {
    fn title_for(&self, matched: &str) -> &'static str {
        match self {
            Self::Fixed(title) => title,
            Self::Keyword { default, overrides } => {
                let lower = matched.to_ascii_lowercase();
                overrides
                    .iter()
                    .find(|(keyword, _)| lower.contains(keyword))
                    .map(|(_, title)| *title)
                    .unwrap_or(default)
            }
        }
    }
}

struct GroupSpec {
    event_type: CatalystEventType,
    patterns: &'static [&'static str],
    title: TitleRule,
    captures_date: bool,
    /// Dates strictly before "now" do not apply to this category.
    forward_only: bool,
}

const CATALOG: &[GroupSpec] = &[
    GroupSpec {
        event_type: CatalystEventType::PdufaDate,
        patterns: &[
            r"(?i)PDUFA(?:\s+target)?(?:\s+action)?\s+date\s+(?:of|is|on)?\s*(?P<date><DATE>)",
            r"(?i)target\s+action\s+date\s+(?:of|is|on)?\s*(?P<date><DATE>)",
            r"(?i)FDA\s+(?:is\s+expected\s+to|will)\s+(?:complete|render)\s+(?:its\s+)?(?:review|decision)[^.]{0,80}?(?:by|on|before)\s+(?P<date><DATE>)",
        ],
        title: TitleRule::Fixed("PDUFA target action date"),
        captures_date: true,
        forward_only: true,
    },
    GroupSpec {
        event_type: CatalystEventType::AdcomMeeting,
        patterns: &[
            r"(?i)advisory\s+committee\s+(?:meeting\s+)?(?:is\s+)?(?:scheduled|will\s+be\s+held|to\s+be\s+held|convenes?)\s*(?:for|on)?\s*(?P<date><DATE>)",
            r"(?i)(?:adcom|advisory\s+committee)[^.]{0,60}?\bon\s+(?P<date><DATE>)",
        ],
        title: TitleRule::Fixed("FDA advisory committee meeting"),
        captures_date: true,
        forward_only: true,
    },
    GroupSpec {
        event_type: CatalystEventType::ExpeditedDesignation,
        patterns: &[
            r"(?i)(?:granted|received|has\s+been\s+granted|was\s+granted)\s+(?:FDA\s+)?(?:breakthrough\s+therapy|fast\s+track|priority\s+review|orphan\s+drug|RMAT)\s+designation",
            r"(?i)(?:breakthrough\s+therapy|fast\s+track|priority\s+review|orphan\s+drug|RMAT)\s+designation\s+(?:was\s+|has\s+been\s+)?(?:granted|received)",
        ],
        title: TitleRule::Keyword {
            default: "Expedited regulatory designation",
            overrides: &[
                ("breakthrough", "Breakthrough therapy designation granted"),
                ("fast track", "Fast track designation granted"),
                ("priority review", "Priority review granted"),
                ("orphan", "Orphan drug designation granted"),
            ],
        },
        captures_date: false,
        forward_only: false,
    },
    GroupSpec {
        event_type: CatalystEventType::RegulatoryApproval,
        patterns: &[
            r"(?i)FDA\s+(?:has\s+)?approved",
            r"(?i)received\s+(?:FDA|marketing)\s+approval",
            r"(?i)approval\s+of\s+(?:the\s+|its\s+)?(?:NDA|BLA|sNDA|sBLA)",
        ],
        title: TitleRule::Fixed("Regulatory approval announced"),
        captures_date: false,
        forward_only: false,
    },
    GroupSpec {
        event_type: CatalystEventType::RegulatoryRejection,
        patterns: &[
            r"(?i)complete\s+response\s+letter",
            r"(?i)FDA\s+(?:has\s+)?(?:declined|refused)\s+to\s+approve",
        ],
        title: TitleRule::Keyword {
            default: "Regulatory application rejected",
            overrides: &[("complete response", "Complete response letter received")],
        },
        captures_date: false,
        forward_only: false,
    },
    GroupSpec {
        event_type: CatalystEventType::DataReadout,
        patterns: &[
            r"(?i)(?:topline|top-line)\s+(?:data|results)\s+(?:are\s+|is\s+)?(?:expected|anticipated)\s+(?:in|by|during)\s+(?P<date><DATE>)",
            r"(?i)data\s+(?:readout|read-out)[^.]{0,60}?(?:expected|anticipated)\s+(?:in|by|during)\s+(?P<date><DATE>)",
            r"(?i)results\s+(?:are\s+)?(?:expected|anticipated)\s+(?:in|by|during)\s+(?P<date><DATE>)",
        ],
        title: TitleRule::Fixed("Clinical data readout expected"),
        captures_date: true,
        forward_only: true,
    },
    GroupSpec {
        event_type: CatalystEventType::TrialMilestone,
        patterns: &[
            r"(?i)first\s+patient\s+(?:was\s+)?(?:dosed|enrolled)",
            r"(?i)(?:completed\s+enrollment|enrollment\s+(?:is\s+|was\s+)?completed?)",
            r"(?i)last\s+patient\s+(?:was\s+)?(?:dosed|completed)",
            r"(?i)initiated\s+(?:a\s+|its\s+)?[Pp]hase\s+[1-3]",
        ],
        title: TitleRule::Keyword {
            default: "Clinical trial milestone",
            overrides: &[
                ("first patient", "First patient dosed"),
                ("enrollment", "Trial enrollment completed"),
                ("initiated", "Clinical trial initiated"),
            ],
        },
        captures_date: false,
        forward_only: false,
    },
    GroupSpec {
        event_type: CatalystEventType::ApplicationSubmission,
        patterns: &[
            r"(?i)(?:submitted|filed)\s+(?:a\s+|an\s+|its\s+)?(?:NDA|BLA|MAA|new\s+drug\s+application|biologics\s+license\s+application|marketing\s+authorization\s+application)",
            r"(?i)(?:NDA|BLA|MAA)\s+(?:submission|filing)\s+(?:was\s+|has\s+been\s+)?(?:submitted|completed|accepted)",
        ],
        title: TitleRule::Keyword {
            default: "Regulatory application submitted",
            overrides: &[("accepted", "Regulatory application accepted for review")],
        },
        captures_date: false,
        forward_only: false,
    },
];

const DESCRIPTION_LIMIT: usize = 240;
const DEDUP_TITLE_PREFIX: usize = 24;

struct CompiledGroup {
    spec: &'static GroupSpec,
    patterns: Vec<Regex>,
}

/// Compiled pattern catalog; build once and share.
pub struct PatternExtractionEngine {
    groups: Vec<CompiledGroup>,
}

impl Default for PatternExtractionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractionEngine {
    pub fn new() -> Self {
        let groups = CATALOG
            .iter()
            .map(|spec| CompiledGroup {
                spec,
                patterns: spec
                    .patterns
                    .iter()
                    .map(|pattern| {
                        Regex::new(&pattern.replace("<DATE>", DATE_FRAGMENT))
                            .expect("catalog patterns are valid")
                    })
                    .collect(),
            })
            .collect();
        Self { groups }
    }

    /// Mine one document, with the filing date as the default event date.
    pub fn extract(&self, text: &str, filing_date: CalendarDate) -> Vec<ExtractedCatalyst> {
        self.extract_at(text, filing_date, CalendarDate::today_utc())
    }

    /// As [`extract`](Self::extract), with an explicit "today" for the
    /// forward-date filter.
    pub fn extract_at(
        &self,
        text: &str,
        filing_date: CalendarDate,
        today: CalendarDate,
    ) -> Vec<ExtractedCatalyst> {
        let mut seen: HashSet<(CatalystEventType, CalendarDate, String)> = HashSet::new();
        let mut out = Vec::new();

        for group in &self.groups {
            for regex in &group.patterns {
                for caps in regex.captures_iter(text) {
                    let Some(matched) = caps.get(0) else { continue };
                    let matched = matched.as_str();

                    let mut is_estimate = false;
                    let date = if group.spec.captures_date {
                        let Some(fragment) = caps.name("date") else { continue };
                        let Some(parsed) = parse_date_fragment(fragment.as_str()) else {
                            continue;
                        };
                        if group.spec.forward_only && parsed.date < today {
                            continue;
                        }
                        is_estimate = parsed.approximate;
                        parsed.date
                    } else {
                        filing_date
                    };

                    let title = group.spec.title.title_for(matched);
                    let key = (group.spec.event_type, date, dedup_prefix(title));
                    if !seen.insert(key) {
                        continue;
                    }

                    out.push(ExtractedCatalyst {
                        event_type: group.spec.event_type,
                        title: title.to_owned(),
                        description: clip_description(matched),
                        date: Some(date),
                        is_estimate,
                    });
                }
            }
        }

        out
    }
}

fn dedup_prefix(title: &str) -> String {
    title
        .to_ascii_lowercase()
        .chars()
        .take(DEDUP_TITLE_PREFIX)
        .collect()
}

fn clip_description(matched: &str) -> String {
    let normalized = matched.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((index, _)) => format!("{}…", &normalized[..index]),
        None => normalized,
    }
}
