// Wiki field typing
//
// Converts the free-text money, date and runtime fields of canonical wiki
// records into typed values and picks out the pass-through columns used by
// the merged movie table.

use super::{ImdbId, RawValue, WikiTable};
use crate::error::{EtlError, EtlResult, Stage};
use crate::parsers::{parse_budget, parse_date, parse_money, parse_runtime};
use chrono::NaiveDate;
use tracing::{debug, info};

/// Columns that must survive consolidation
pub const REQUIRED_COLUMNS: [&str; 4] = ["Box office", "Budget", "Release date", "Running time"];

/// Typed view of one wiki movie
#[derive(Debug, Clone, PartialEq)]
pub struct WikiMovie {
    pub imdb_id: ImdbId,
    pub title: Option<String>,
    pub url: Option<String>,
    pub imdb_link: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Minutes; `Some(0)` when present but unrecognised
    pub running_time: Option<u32>,
    pub budget: Option<f64>,
    pub box_office: Option<f64>,
    pub country: Option<String>,
    pub distributor: Option<String>,
    pub producers: Option<String>,
    pub director: Option<String>,
    pub starring: Option<String>,
    pub cinematography: Option<String>,
    pub editors: Option<String>,
    pub writers: Option<String>,
    pub composers: Option<String>,
    pub based_on: Option<String>,
}

impl WikiMovie {
    /// Movie with only its key set
    pub fn new(imdb_id: ImdbId) -> Self {
        Self {
            imdb_id,
            title: None,
            url: None,
            imdb_link: None,
            release_date: None,
            running_time: None,
            budget: None,
            box_office: None,
            country: None,
            distributor: None,
            producers: None,
            director: None,
            starring: None,
            cinematography: None,
            editors: None,
            writers: None,
            composers: None,
            based_on: None,
        }
    }
}

/// Type every canonical record
///
/// # Errors
/// `MissingColumn` when one of [`REQUIRED_COLUMNS`] was pruned or never
/// present.
pub fn parse_wiki_table(table: WikiTable) -> EtlResult<Vec<WikiMovie>> {
    for column in REQUIRED_COLUMNS {
        if !table.has_column(column) {
            return Err(EtlError::MissingColumn {
                stage: Stage::ParseWikiFields,
                table: "wiki movies",
                column: column.to_string(),
            });
        }
    }

    let mut unparsed = FieldMisses::default();
    let movies: Vec<WikiMovie> = table
        .rows
        .into_iter()
        .map(|row| {
            let fields = row.fields;
            let text = |name: &str| fields.get(name).map(RawValue::to_column_text);
            let grammar_text = |name: &str| {
                fields
                    .get(name)
                    .and_then(|v| v.joined_text().map(|t| t.into_owned()))
            };

            let box_office_text = grammar_text("Box office");
            let budget_text = grammar_text("Budget");
            let release_text = grammar_text("Release date");

            let box_office = box_office_text.as_deref().and_then(parse_money);
            let budget = budget_text.as_deref().and_then(parse_budget);
            let release_date = release_text.as_deref().and_then(parse_date);
            let running_time = fields
                .get("Running time")
                .map(|v| v.joined_text().map_or(0, |t| parse_runtime(&t)));

            unparsed.box_office += usize::from(box_office_text.is_some() && box_office.is_none());
            unparsed.budget += usize::from(budget_text.is_some() && budget.is_none());
            unparsed.release_date += usize::from(release_text.is_some() && release_date.is_none());

            WikiMovie {
                imdb_id: row.imdb_id,
                title: text("title"),
                url: text("url"),
                imdb_link: text("imdb_link"),
                release_date,
                running_time,
                budget,
                box_office,
                country: text("Country"),
                distributor: text("Distributor"),
                producers: text("Producer(s)"),
                director: text("Director"),
                starring: text("Starring"),
                cinematography: text("Cinematography"),
                editors: text("Editor(s)"),
                writers: text("Writer(s)"),
                composers: text("Composer(s)"),
                based_on: text("Based on"),
            }
        })
        .collect();

    debug!(
        box_office = unparsed.box_office,
        budget = unparsed.budget,
        release_date = unparsed.release_date,
        "Wiki values present but not recognised"
    );
    info!(movies = movies.len(), "Typed wiki fields");
    Ok(movies)
}

#[derive(Default)]
struct FieldMisses {
    box_office: usize,
    budget: usize,
    release_date: usize,
}
