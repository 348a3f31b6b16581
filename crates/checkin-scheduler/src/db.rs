use rusqlite::Connection;

use crate::error::Result;

/// Initialise the trigger schema in `conn`.
///
/// Creates the `triggers` table (idempotent) and an index on
/// `(status, fire_at)` so the dispatcher's claim query stays cheap.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS triggers (
            key           TEXT    NOT NULL PRIMARY KEY,
            user_id       TEXT    NOT NULL,
            fire_at       INTEGER NOT NULL,   -- epoch seconds (boot instant)
            available_at  INTEGER NOT NULL,   -- epoch seconds (check-in instant)
            payload       TEXT    NOT NULL,   -- JSON-encoded TriggerPayload
            status        TEXT    NOT NULL DEFAULT 'pending',
            last_error    TEXT,
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_triggers_status_fire_at ON triggers (status, fire_at);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM triggers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }
}
