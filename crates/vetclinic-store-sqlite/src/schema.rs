//! SQL schema for the clinic SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout version for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Written by the account service; read here for authorisation.
CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    role            TEXT NOT NULL,   -- 'client' | 'veterinarian' | 'secretary' | 'admin'
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    veterinarian_id TEXT,            -- secretaries only
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS animals (
    animal_id  TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL REFERENCES users(user_id),
    name       TEXT NOT NULL,
    species    TEXT,
    birth_date TEXT                  -- YYYY-MM-DD
);

-- All timestamps are fixed-width RFC 3339 UTC, so text order is time order.
CREATE TABLE IF NOT EXISTS appointments (
    appointment_id   TEXT PRIMARY KEY,
    date             TEXT NOT NULL,
    client_id        TEXT NOT NULL REFERENCES users(user_id),
    veterinarian_id  TEXT NOT NULL REFERENCES users(user_id),
    animal_id        TEXT NOT NULL REFERENCES animals(animal_id),
    kind             TEXT NOT NULL,  -- 'household' | 'clinic'
    status           TEXT NOT NULL DEFAULT 'pending',
    services         TEXT NOT NULL DEFAULT '[]',
    case_description TEXT NOT NULL DEFAULT '',
    reminder_sent    INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- participant_key is the SHA-256 of the canonical participant list.
CREATE TABLE IF NOT EXISTS chats (
    chat_id         TEXT PRIMARY KEY,
    participant_key TEXT NOT NULL UNIQUE,
    veterinarian_id TEXT,
    is_group        INTEGER NOT NULL DEFAULT 1,
    name            TEXT NOT NULL,
    last_message_id TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_participants (
    chat_id TEXT NOT NULL REFERENCES chats(chat_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    PRIMARY KEY (chat_id, user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    chat_id    TEXT NOT NULL REFERENCES chats(chat_id) ON DELETE CASCADE,
    sender_id  TEXT NOT NULL,
    kind       TEXT NOT NULL,        -- 'text' | 'image' | 'video' | 'audio' | 'file'
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message_reads (
    message_id TEXT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL,
    read_at    TEXT NOT NULL,
    PRIMARY KEY (message_id, user_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    appointment_id  TEXT NOT NULL REFERENCES appointments(appointment_id) ON DELETE CASCADE,
    message         TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS users_vet_idx                ON users(veterinarian_id);
CREATE INDEX IF NOT EXISTS animals_owner_idx            ON animals(owner_id);
CREATE INDEX IF NOT EXISTS appointments_vet_date_idx    ON appointments(veterinarian_id, date);
CREATE INDEX IF NOT EXISTS appointments_client_idx      ON appointments(client_id);
CREATE INDEX IF NOT EXISTS appointments_reminder_idx    ON appointments(status, reminder_sent, date);
CREATE INDEX IF NOT EXISTS chat_participants_user_idx   ON chat_participants(user_id);
CREATE INDEX IF NOT EXISTS messages_chat_idx            ON messages(chat_id, created_at);
CREATE INDEX IF NOT EXISTS notifications_user_idx       ON notifications(user_id, created_at);

PRAGMA user_version = 1;
";
