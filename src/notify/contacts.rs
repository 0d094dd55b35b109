// src/notify/contacts.rs

use sqlx::{query_as, FromRow, PgPool};

use crate::models::{Party, PartyKind};

#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Where each kind of party keeps its contact details.
fn contact_query(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::User => "SELECT name, email, phone FROM users WHERE id = $1",
        PartyKind::Customer => "SELECT name, email, phone FROM customers WHERE id = $1",
        PartyKind::Hotel => "SELECT name, email, contact_number AS phone FROM hotels WHERE id = $1",
    }
}

pub async fn lookup(pool: &PgPool, party: Party) -> Result<Option<Contact>, sqlx::Error> {
    query_as::<_, Contact>(contact_query(party.kind))
        .bind(party.id)
        .fetch_optional(pool)
        .await
}

/// Device tokens for a party. A hotel reaches its admin and managers.
pub async fn push_tokens(pool: &PgPool, party: Party) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT token FROM fcm_tokens
        WHERE owner_id = $1
           OR ($2 AND owner_id IN (
                SELECT unnest(array_append(manager_ids, admin_id)) FROM hotels WHERE id = $1
              ))
        "#,
    )
    .bind(party.id)
    .bind(party.kind == PartyKind::Hotel)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_contact_source() {
        for kind in [PartyKind::User, PartyKind::Customer, PartyKind::Hotel] {
            let sql = contact_query(kind);
            assert!(sql.contains("email"));
            assert!(sql.contains("$1"));
        }
        assert!(contact_query(PartyKind::Hotel).contains("FROM hotels"));
    }
}
