//! Call record queries used by the bridge.

use crate::DbError;
use callbridge_types::{CallClassification, CallDirection, CallRecord};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Parameters for inserting a call record.
#[derive(Debug, Clone)]
pub struct NewCall<'a> {
    pub call_sid: &'a str,
    pub scenario_id: Option<i64>,
    pub from_number: &'a str,
    pub to_number: &'a str,
    pub direction: CallDirection,
}

/// Inserts a call record and returns its row id.
pub fn create_call(conn: &Connection, call: &NewCall<'_>) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO calls (call_sid, scenario_id, from_number, to_number, direction)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            call.call_sid,
            call.scenario_id,
            call.from_number,
            call.to_number,
            call.direction.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Loads a call record by its telephony call identifier.
///
/// Returns `Ok(None)` when no such call exists.
pub fn get_call(conn: &Connection, call_sid: &str) -> Result<Option<CallRecord>, DbError> {
    let record = conn
        .query_row(
            "SELECT call_sid, from_number, to_number, direction, scenario_id,
                    bridge_executed, sms_sent_log
             FROM calls WHERE call_sid = ?1",
            [call_sid],
            map_row_to_call,
        )
        .optional()?;
    Ok(record)
}

fn map_row_to_call(row: &Row<'_>) -> rusqlite::Result<CallRecord> {
    let direction: String = row.get(3)?;
    Ok(CallRecord {
        call_sid: row.get(0)?,
        from_number: row.get(1)?,
        to_number: row.get(2)?,
        direction: CallDirection::parse(&direction),
        scenario_id: row.get(4)?,
        bridge_executed: row.get(5)?,
        sms_sent: row.get(6)?,
    })
}

/// Records that the call was handed off to a human.
///
/// Sets `bridge_executed` and the `bridged` classification in one statement,
/// only when the hand-off has not been recorded yet. Returns `true` when this
/// call performed the transition and `false` when it had already happened.
pub fn mark_bridge_executed(conn: &Connection, call_sid: &str) -> Result<bool, DbError> {
    let changed = conn.execute(
        "UPDATE calls
         SET bridge_executed = 1, classification = ?2, updated_at = datetime('now')
         WHERE call_sid = ?1 AND bridge_executed = 0",
        params![call_sid, CallClassification::Bridged.label()],
    )?;
    if changed == 0 {
        ensure_exists(conn, call_sid)?;
    }
    Ok(changed > 0)
}

/// Records that the follow-up SMS was sent. Same transition semantics as
/// [`mark_bridge_executed`].
pub fn mark_sms_sent(conn: &Connection, call_sid: &str) -> Result<bool, DbError> {
    let changed = conn.execute(
        "UPDATE calls
         SET sms_sent_log = 1, updated_at = datetime('now')
         WHERE call_sid = ?1 AND sms_sent_log = 0",
        [call_sid],
    )?;
    if changed == 0 {
        ensure_exists(conn, call_sid)?;
    }
    Ok(changed > 0)
}

fn ensure_exists(conn: &Connection, call_sid: &str) -> Result<(), DbError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM calls WHERE call_sid = ?1)",
        [call_sid],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(DbError::CallNotFound(call_sid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        run_migrations(&conn).expect("migrations");
        create_call(
            &conn,
            &NewCall {
                call_sid: "CA100",
                scenario_id: None,
                from_number: "+81311112222",
                to_number: "+81500000000",
                direction: CallDirection::Inbound,
            },
        )
        .expect("insert call");
        conn
    }

    #[test]
    fn get_call_reads_flags_and_direction() {
        let conn = setup();
        let call = get_call(&conn, "CA100").expect("query").expect("exists");
        assert_eq!(call.direction, CallDirection::Inbound);
        assert!(!call.bridge_executed);
        assert!(!call.sms_sent);
        assert_eq!(call.caller_number(), "+81311112222");

        assert!(get_call(&conn, "CA404").expect("query").is_none());
    }

    #[test]
    fn bridge_transition_happens_once() {
        let conn = setup();
        assert!(mark_bridge_executed(&conn, "CA100").expect("first"));
        assert!(!mark_bridge_executed(&conn, "CA100").expect("second"));

        let classification: Option<String> = conn
            .query_row(
                "SELECT classification FROM calls WHERE call_sid = 'CA100'",
                [],
                |row| row.get(0),
            )
            .expect("classification");
        assert_eq!(classification.as_deref(), Some("bridged"));
    }

    #[test]
    fn sms_transition_happens_once() {
        let conn = setup();
        assert!(mark_sms_sent(&conn, "CA100").expect("first"));
        assert!(!mark_sms_sent(&conn, "CA100").expect("second"));
        let call = get_call(&conn, "CA100").expect("query").expect("exists");
        assert!(call.sms_sent);
        assert!(!call.bridge_executed);
    }

    #[test]
    fn transitions_on_unknown_call_are_errors() {
        let conn = setup();
        assert!(matches!(
            mark_bridge_executed(&conn, "CA404"),
            Err(DbError::CallNotFound(_))
        ));
        assert!(matches!(
            mark_sms_sent(&conn, "CA404"),
            Err(DbError::CallNotFound(_))
        ));
    }
}
