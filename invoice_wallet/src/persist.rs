use anyhow::{anyhow, bail, Context as _, Result};
use invoice_core::{InvoiceState, PaymentHash, PersistedInvoice};
use rusqlite::{params, OptionalExtension as _, TransactionBehavior};
use tracing::{event, Level};

const SCHEMA_NAME: &str = "li_invoices";
const MIGRATIONS: &[&str] = &[
    // Version 0 - initial schema
    "CREATE TABLE IF NOT EXISTS li_invoices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        preimage BLOB NOT NULL,
        payment_hash BLOB NOT NULL UNIQUE,
        payment_secret BLOB NOT NULL,
        key_path TEXT NOT NULL,
        short_chan_id INTEGER NOT NULL,
        state INTEGER NOT NULL,
        amount_sat INTEGER NOT NULL DEFAULT 0,
        used_at INTEGER,
        metadata BLOB
    );
    CREATE INDEX IF NOT EXISTS li_invoices_state ON li_invoices (state, id);",
];

const SELECT_INVOICE: &str = "SELECT preimage, payment_hash, payment_secret, key_path, \
    short_chan_id, state, amount_sat, used_at, metadata FROM li_invoices";

/// Runs the migrations of `schema_name` that haven't been applied yet, recording the version
/// reached in `li_schemas`.
pub fn migrate_schema(
    db_tx: &rusqlite::Transaction,
    schema_name: &str,
    migrations: &[&str],
) -> Result<()> {
    db_tx
        .execute(
            "CREATE TABLE IF NOT EXISTS li_schemas (
                name TEXT PRIMARY KEY NOT NULL,
                version INTEGER NOT NULL
            )",
            [],
        )
        .context("creating li_schemas")?;

    let current = db_tx
        .query_row(
            "SELECT version FROM li_schemas WHERE name = ?1",
            [schema_name],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    let next = current.map_or(0, |version| version as usize + 1);

    for (version, migration) in migrations.iter().enumerate().skip(next) {
        db_tx
            .execute_batch(migration)
            .with_context(|| format!("migrating {} to version {}", schema_name, version))?;
        db_tx.execute(
            "INSERT OR REPLACE INTO li_schemas (name, version) VALUES (?1, ?2)",
            params![schema_name, version as u32],
        )?;
        event!(
            Level::DEBUG,
            schema = schema_name,
            version = version,
            "applied migration"
        );
    }

    Ok(())
}

/// Where invoice secrets live between registration and use.
///
/// The store only moves records around. It never derives keys or looks inside the metadata.
pub trait InvoiceStore {
    /// Creates or upgrades the tables. Safe to call on every start.
    fn migrate(&mut self) -> Result<()>;

    /// Saves freshly registered secrets. Either all of them are written or none are. A record in
    /// any other state fails the whole batch.
    fn persist_registered(&mut self, invoices: &[PersistedInvoice]) -> Result<()>;

    /// How many registered secrets haven't been turned into an invoice yet.
    fn count_unused(&self) -> Result<usize>;

    fn find_by_payment_hash(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<Option<PersistedInvoice>>;

    /// Hands the oldest unused record to `consume`, which returns the record marked as used.
    ///
    /// The read and the write happen in one transaction. When `consume` fails nothing is written
    /// and the record stays unused. `Ok(None)` means there was no unused record.
    fn take_oldest_unused<R>(
        &mut self,
        consume: impl FnOnce(&PersistedInvoice) -> Result<(R, PersistedInvoice)>,
    ) -> Result<Option<R>>;
}

fn invoice_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersistedInvoice> {
    let state_code = row.get::<_, i64>(5)?;
    let used_at = row.get::<_, Option<u64>>(7)?;
    let state = InvoiceState::from_columns(state_code, used_at).ok_or_else(|| {
        event!(
            Level::WARN,
            state = state_code,
            "invoice row has an unknown state"
        );
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Integer,
            format!("unknown invoice state {}", state_code).into(),
        )
    })?;

    Ok(PersistedInvoice {
        preimage: row.get(0)?,
        payment_hash: row.get(1)?,
        payment_secret: row.get(2)?,
        key_path: row.get(3)?,
        short_channel_id: row.get(4)?,
        state,
        amount_sat: row.get(6)?,
        metadata: row.get(8)?,
    })
}

impl InvoiceStore for rusqlite::Connection {
    fn migrate(&mut self) -> Result<()> {
        let db_tx = self.transaction()?;
        migrate_schema(&db_tx, SCHEMA_NAME, MIGRATIONS)?;
        db_tx.commit()?;
        Ok(())
    }

    fn persist_registered(&mut self, invoices: &[PersistedInvoice]) -> Result<()> {
        let db_tx = self.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = db_tx.prepare(
                "INSERT INTO li_invoices (preimage, payment_hash, payment_secret, key_path,
                    short_chan_id, state, amount_sat, used_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, NULL)",
            )?;
            for invoice in invoices {
                // dropping the transaction on an early return rolls it back
                if invoice.state != InvoiceState::Registered {
                    bail!("invoice {} is not freshly registered", invoice.payment_hash);
                }
                stmt.execute(params![
                    invoice.preimage,
                    invoice.payment_hash,
                    invoice.payment_secret,
                    invoice.key_path,
                    invoice.short_channel_id,
                    InvoiceState::REGISTERED,
                ])
                .with_context(|| format!("inserting invoice {}", invoice.payment_hash))?;
            }
        }
        db_tx.commit()?;

        event!(
            Level::DEBUG,
            count = invoices.len(),
            "persisted registered invoice secrets"
        );
        Ok(())
    }

    fn count_unused(&self) -> Result<usize> {
        let count = self
            .query_row(
                "SELECT COUNT(*) FROM li_invoices WHERE state = ?1",
                [InvoiceState::REGISTERED],
                |row| row.get::<_, i64>(0),
            )
            .context("counting unused invoices")?;
        Ok(count as usize)
    }

    fn find_by_payment_hash(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<Option<PersistedInvoice>> {
        let invoice = self
            .query_row(
                &format!("{} WHERE payment_hash = ?1", SELECT_INVOICE),
                [payment_hash],
                invoice_from_row,
            )
            .optional()
            .with_context(|| format!("looking up invoice {}", payment_hash))?;
        Ok(invoice)
    }

    fn take_oldest_unused<R>(
        &mut self,
        consume: impl FnOnce(&PersistedInvoice) -> Result<(R, PersistedInvoice)>,
    ) -> Result<Option<R>> {
        let db_tx = self.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let oldest = db_tx
            .query_row(
                &format!("{} WHERE state = ?1 ORDER BY id ASC LIMIT 1", SELECT_INVOICE),
                [InvoiceState::REGISTERED],
                invoice_from_row,
            )
            .optional()
            .context("reading oldest unused invoice")?;

        let oldest = match oldest {
            Some(oldest) => oldest,
            None => {
                event!(Level::WARN, "no unused invoice secrets left");
                return Ok(None);
            }
        };

        // dropping the transaction on an early return rolls it back
        let (ret, used) = consume(&oldest)?;

        if used.payment_hash != oldest.payment_hash {
            bail!(
                "consumer returned invoice {} in place of {}",
                used.payment_hash,
                oldest.payment_hash
            );
        }
        let used_at = used
            .used_at()
            .ok_or_else(|| anyhow!("invoice {} was not marked as used", used.payment_hash))?;

        let updated = db_tx.execute(
            "UPDATE li_invoices SET state = ?1, amount_sat = ?2, used_at = ?3, metadata = ?4
             WHERE payment_hash = ?5 AND state = ?6",
            params![
                InvoiceState::USED,
                used.amount_sat,
                used_at,
                used.metadata,
                used.payment_hash,
                InvoiceState::REGISTERED,
            ],
        )?;
        if updated != 1 {
            bail!("invoice {} is no longer unused", used.payment_hash);
        }
        db_tx.commit()?;

        Ok(Some(ret))
    }
}
