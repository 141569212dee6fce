//! Scenario script loading.

use crate::DbError;
use callbridge_types::{ConversationMode, ScenarioScript};
use rusqlite::{params, Connection, OptionalExtension};

/// Parameters for inserting a scenario.
#[derive(Debug, Clone, Default)]
pub struct NewScenario<'a> {
    pub name: &'a str,
    pub greeting: &'a str,
    pub disclaimer: &'a str,
    pub guidance: &'a str,
    pub mode: ConversationMode,
    pub silence_short_secs: u64,
    pub silence_long_secs: u64,
    pub bridge_number: Option<&'a str>,
    pub sms_template: Option<&'a str>,
}

/// Inserts a scenario and returns its id.
pub fn create_scenario(conn: &Connection, scenario: &NewScenario<'_>) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO scenarios (
            name, greeting_text, disclaimer_text, question_guidance_text,
            conversation_mode, silence_timeout_short, silence_timeout_long,
            bridge_number, sms_template
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            scenario.name,
            scenario.greeting,
            scenario.disclaimer,
            scenario.guidance,
            scenario.mode.as_tag(),
            scenario.silence_short_secs as i64,
            scenario.silence_long_secs as i64,
            scenario.bridge_number,
            scenario.sms_template,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Appends a question to a scenario.
pub fn add_question(
    conn: &Connection,
    scenario_id: i64,
    text: &str,
    sort_order: i64,
    active: bool,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO questions (scenario_id, text, sort_order, is_active)
         VALUES (?1, ?2, ?3, ?4)",
        params![scenario_id, text, sort_order, active],
    )?;
    Ok(())
}

/// Appends a closing statement to a scenario.
pub fn add_closing(
    conn: &Connection,
    scenario_id: i64,
    text: &str,
    sort_order: i64,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO ending_guidances (scenario_id, text, sort_order) VALUES (?1, ?2, ?3)",
        params![scenario_id, text, sort_order],
    )?;
    Ok(())
}

/// Toggles the `is_active` flag of a scenario.
pub fn set_scenario_active(conn: &Connection, scenario_id: i64, active: bool) -> Result<(), DbError> {
    let changed = conn.execute(
        "UPDATE scenarios SET is_active = ?2 WHERE id = ?1",
        params![scenario_id, active],
    )?;
    if changed == 0 {
        return Err(DbError::ScenarioNotFound(scenario_id));
    }
    Ok(())
}

/// Loads the full script for one call.
///
/// Inactive questions are skipped. Questions and closings are ordered by
/// `sort_order`, then insertion order. `active` is false when the scenario
/// is inactive, hard-stopped or soft-deleted. Returns `Ok(None)` when the
/// scenario does not exist.
pub fn load_scenario_script(
    conn: &Connection,
    scenario_id: i64,
) -> Result<Option<ScenarioScript>, DbError> {
    let header = conn
        .query_row(
            "SELECT name, greeting_text, disclaimer_text, question_guidance_text,
                    conversation_mode, silence_timeout_short, silence_timeout_long,
                    bridge_number, sms_template,
                    is_active = 1 AND is_hard_stopped = 0 AND deleted_at IS NULL
             FROM scenarios WHERE id = ?1",
            [scenario_id],
            |row| {
                let mode: String = row.get(4)?;
                let short: i64 = row.get(5)?;
                let long: i64 = row.get(6)?;
                Ok(ScenarioScript {
                    scenario_id,
                    name: row.get(0)?,
                    greeting: row.get(1)?,
                    disclaimer: row.get(2)?,
                    guidance: row.get(3)?,
                    mode: ConversationMode::from_tag(&mode),
                    silence_short_secs: short.max(0) as u64,
                    silence_long_secs: long.max(0) as u64,
                    bridge_destination: row.get(7)?,
                    sms_template: row.get(8)?,
                    active: row.get(9)?,
                    questions: Vec::new(),
                    closings: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut script) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT text FROM questions
         WHERE scenario_id = ?1 AND is_active = 1
         ORDER BY sort_order ASC, id ASC",
    )?;
    for text in stmt.query_map([scenario_id], |row| row.get::<_, String>(0))? {
        script.questions.push(text?);
    }

    let mut stmt = conn.prepare(
        "SELECT text FROM ending_guidances
         WHERE scenario_id = ?1
         ORDER BY sort_order ASC, id ASC",
    )?;
    for text in stmt.query_map([scenario_id], |row| row.get::<_, String>(0))? {
        script.closings.push(text?);
    }

    Ok(Some(script))
}
