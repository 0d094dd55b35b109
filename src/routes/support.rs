// src/routes/support.rs
//
// Support tickets and agent assignment. An agent's `busy` status is the
// exclusion flag: it is only flipped inside the transaction that locks both
// the ticket and the agent row.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::{query, query_as, PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::{parse_id, parse_id_filter, parse_ids, require_text, search_term, ApiJson, ApiPath, ApiQuery, Envelope, Page, Reply};
use crate::auth::{Actor, Role};
use crate::domain::ticket::{check_assignable, releases_agent};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    NotificationKind, Party, SupportAgentStatus, SupportTicket, TicketCategory, TicketPriority, TicketStatus, UserRole,
};
use crate::notify::{Draft, Notifier};
use crate::policy::{ensure_can_set_deleted, Visibility};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketBody {
    pub customer_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub category: TicketCategory,
    pub description: String,
    #[serde(default = "medium")]
    pub priority: TicketPriority,
    #[serde(default)]
    pub attachments: Vec<String>,
}
fn medium() -> TicketPriority { TicketPriority::Medium }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchTicketBody {
    pub category: Option<TicketCategory>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub attachments: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: TicketStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTicketsQ {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
    pub assigned_to: Option<String>,
    pub customer_id: Option<String>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
}

const TICKET_FILTER: &str = r#"
    WHERE ($1 OR (is_active AND NOT is_deleted))
      AND ($2::text IS NULL OR description ILIKE '%' || $2 || '%')
      AND ($3::ticket_status IS NULL OR status = $3)
      AND ($4::ticket_priority IS NULL OR priority = $4)
      AND ($5::ticket_category IS NULL OR category = $5)
      AND ($6::uuid[] IS NULL OR assigned_to = ANY($6))
      AND ($7::uuid[] IS NULL OR customer_id = ANY($7))
      AND ($8::bool IS NULL OR is_active = $8)
      AND ($9::bool IS NULL OR is_deleted = $9)
"#;

/// Oldest-idle available agent first. Rows held by a concurrent assignment are skipped.
const PICK_AGENT: &str = r#"
    SELECT id FROM users
    WHERE role = 'supportAgent' AND support_agent_status = 'available'
      AND is_active AND NOT is_deleted
    ORDER BY agent_status_changed_at ASC NULLS FIRST, created_at ASC, id ASC
    LIMIT 1
    FOR UPDATE SKIP LOCKED
"#;

pub async fn create_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(b): ApiJson<CreateTicketBody>,
) -> Reply<SupportTicket> {
    let customer_id = match actor.role {
        Role::Customer => actor.id,
        Role::Guest => return Err(ApiError::Unauthorized("Please sign in to continue".into())),
        _ => b.customer_id.ok_or_else(|| ApiError::validation("customerId is required"))?,
    };
    require_text(&b.description, "description")?;

    if let Some(booking_id) = b.booking_id {
        let owner: Option<Uuid> = sqlx::query_scalar(r#"SELECT customer_id FROM bookings WHERE id = $1"#)
            .bind(booking_id)
            .fetch_optional(&state.pool)
            .await?;
        match owner {
            None => return Err(ApiError::not_found("Booking")),
            Some(owner) if owner != customer_id => {
                return Err(ApiError::validation("Booking does not belong to this customer"))
            }
            Some(_) => {}
        }
    }

    let ticket = query_as::<_, SupportTicket>(
        r#"
        INSERT INTO support_tickets (id, customer_id, booking_id, category, description, priority, attachments)
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(customer_id)
    .bind(b.booking_id)
    .bind(b.category)
    .bind(b.description.trim())
    .bind(b.priority)
    .bind(&b.attachments)
    .fetch_one(&state.pool)
    .await?;

    // One attempt; an unassigned ticket waits for autoAssign or assignTicket.
    let ticket = match auto_assign(&state.pool, ticket.id).await {
        Ok(assigned) => assigned,
        Err(e) => {
            warn!(error = %e, ticket_id = %ticket.id, "auto-assignment failed");
            ticket
        }
    };
    if let Some(agent) = ticket.assigned_to {
        notify_assignment(&state.notifier, &ticket, agent);
    }
    let message = match ticket.assigned_to {
        Some(_) => "Support ticket created and assigned successfully",
        None => "Support ticket created successfully",
    };
    Ok(Json(Envelope::ok(ticket).message(message)))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
) -> Reply<SupportTicket> {
    let id = parse_id(&id, "ticket")?;
    let ticket = query_as::<_, SupportTicket>(r#"SELECT * FROM support_tickets WHERE id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))?;
    let ticket = Visibility::for_actor(&actor).visible(ticket, "Ticket")?;
    if actor.is_customer() && ticket.customer_id != actor.id {
        return Err(ApiError::not_found("Ticket"));
    }
    actor.require_self_or_staff(ticket.customer_id)?;
    Ok(Json(Envelope::ok(ticket)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    actor: Actor,
    ApiQuery(q): ApiQuery<ListTicketsQ>,
) -> Reply<Vec<SupportTicket>> {
    if actor.role == Role::Guest {
        return Err(ApiError::Unauthorized("Please sign in to continue".into()));
    }
    let vis = Visibility::for_actor(&actor);
    let page = Page::new(q.page, q.limit);
    let search = search_term(q.search);
    let assigned = parse_id_filter(q.assigned_to.as_deref(), "user")?;
    let customers = match actor.role {
        Role::Customer => Some(vec![actor.id]),
        _ => parse_id_filter(q.customer_id.as_deref(), "customer")?,
    };
    let (is_active, is_deleted) =
        if vis.include_hidden() { (q.is_active, q.is_deleted) } else { (None, None) };

    let count_sql = format!("SELECT COUNT(*) FROM support_tickets {TICKET_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.status)
        .bind(q.priority)
        .bind(q.category)
        .bind(&assigned)
        .bind(&customers)
        .bind(is_active)
        .bind(is_deleted)
        .fetch_one(&state.pool)
        .await?;

    let list_sql = format!(
        "SELECT * FROM support_tickets {TICKET_FILTER} ORDER BY created_at DESC LIMIT $10 OFFSET $11"
    );
    let rows = query_as::<_, SupportTicket>(&list_sql)
        .bind(vis.include_hidden())
        .bind(&search)
        .bind(q.status)
        .bind(q.priority)
        .bind(q.category)
        .bind(&assigned)
        .bind(&customers)
        .bind(is_active)
        .bind(is_deleted)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(
        Envelope::ok(rows).paginated(page.summarize(total)).filters(json!({
            "search": search,
            "status": q.status,
            "priority": q.priority,
            "category": q.category,
            "assignedTo": assigned,
            "customerId": customers,
        })),
    ))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<String>,
    ApiJson(b): ApiJson<PatchTicketBody>,
) -> Reply<SupportTicket> {
    let id = parse_id(&id, "ticket")?;
    ensure_can_set_deleted(&actor, b.is_deleted)?;
    if b.is_active.is_some() && !actor.is_staff() {
        return Err(ApiError::Forbidden("Only staff can change ticket flags".into()));
    }
    if let Some(d) = &b.description {
        require_text(d, "description")?;
    }

    let mut tx = state.pool.begin().await?;
    let current = lock_ticket(&mut tx, id).await?;
    let current = Visibility::for_actor(&actor).visible(current, "Ticket")?;
    actor.require_self_or_staff(current.customer_id)?;

    let ticket = query_as::<_, SupportTicket>(
        r#"
        UPDATE support_tickets SET
          category    = COALESCE($2, category),
          description = COALESCE($3, description),
          priority    = COALESCE($4, priority),
          attachments = COALESCE($5, attachments),
          is_active   = COALESCE($6, is_active),
          is_deleted  = COALESCE($7, is_deleted),
          updated_at  = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.category)
    .bind(b.description.as_deref().map(str::trim))
    .bind(b.priority)
    .bind(b.attachments)
    .bind(b.is_active)
    .bind(b.is_deleted)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(Envelope::ok(ticket).message("Support ticket updated successfully")))
}

/// Hard delete. Agents working a deleted ticket go back to the pool.
pub async fn delete_tickets(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ids): ApiPath<String>,
) -> Reply<serde_json::Value> {
    actor.require_super_admin()?;
    let ids = parse_ids(&ids, "ticket")?;

    // Tickets first, then agents, like every other assignment path.
    let mut tx = state.pool.begin().await?;
    let held: Vec<(Option<Uuid>, TicketStatus)> = sqlx::query_as(
        r#"SELECT assigned_to, status FROM support_tickets WHERE id = ANY($1) ORDER BY id FOR UPDATE"#,
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?;
    if held.is_empty() {
        return Err(ApiError::NotFound("No tickets found with the provided IDs".into()));
    }
    let agents: Vec<Uuid> = held
        .into_iter()
        .filter(|(_, status)| matches!(status, TicketStatus::Open | TicketStatus::InProgress))
        .filter_map(|(agent, _)| agent)
        .collect();

    query(
        r#"
        UPDATE users SET support_agent_status = 'available', agent_status_changed_at = NOW(), updated_at = NOW()
        WHERE id = ANY($1) AND support_agent_status = 'busy'
        "#,
    )
    .bind(&agents)
    .execute(&mut *tx)
    .await?;
    let res = query(r#"DELETE FROM support_tickets WHERE id = ANY($1)"#)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(
        Envelope::ok(json!({ "deletedCount": res.rows_affected() }))
            .message(format!("{} ticket(s) deleted successfully", res.rows_affected())),
    ))
}

// ───────────────────────────────────────
// Assignment endpoints
// ───────────────────────────────────────
pub async fn assign_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath((ticket_id, user_id)): ApiPath<(String, String)>,
) -> Reply<SupportTicket> {
    let ticket_id = parse_id(&ticket_id, "ticket")?;
    let user_id = parse_id(&user_id, "user")?;
    actor.require_support()?;

    let ticket = assign_to(&state.pool, ticket_id, user_id).await?;
    notify_assignment(&state.notifier, &ticket, user_id);
    Ok(Json(Envelope::ok(ticket).message("Ticket assigned successfully")))
}

pub async fn auto_assign_ticket(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ticket_id): ApiPath<String>,
) -> Reply<SupportTicket> {
    let ticket_id = parse_id(&ticket_id, "ticket")?;
    actor.require_support()?;

    let ticket = auto_assign(&state.pool, ticket_id).await?;
    match ticket.assigned_to {
        Some(agent) => {
            notify_assignment(&state.notifier, &ticket, agent);
            Ok(Json(Envelope::ok(ticket).message("Ticket assigned successfully")))
        }
        None => Ok(Json(Envelope::ok(ticket).message("No support agent is available right now"))),
    }
}

pub async fn status_update(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(ticket_id): ApiPath<String>,
    ApiJson(b): ApiJson<StatusBody>,
) -> Reply<SupportTicket> {
    let ticket_id = parse_id(&ticket_id, "ticket")?;
    actor.require_support()?;

    let ticket = update_status(&state.pool, ticket_id, b.status).await?;
    state.notifier.send(
        Draft::new(
            Party::customer(ticket.customer_id),
            actor.party(),
            NotificationKind::SupportTicket,
            format!("Your support ticket is now {}", ticket.status),
        )
        .with_email("Support ticket update"),
    );
    Ok(Json(Envelope::ok(ticket).message("Ticket status updated successfully")))
}

// ───────────────────────────────────────
// Transactional core
// ───────────────────────────────────────

/// Hands an unassigned ticket to the longest-idle available agent. Returns the
/// ticket unchanged when nobody is available.
pub async fn auto_assign(pool: &PgPool, ticket_id: Uuid) -> ApiResult<SupportTicket> {
    let mut tx = pool.begin().await?;
    let ticket = lock_ticket(&mut tx, ticket_id).await?;
    check_assignable(ticket.status, ticket.assigned_to)?;

    let agent: Option<Uuid> = sqlx::query_scalar(PICK_AGENT).fetch_optional(&mut *tx).await?;
    let Some(agent) = agent else {
        info!(ticket_id = %ticket_id, "no support agent available");
        return Ok(ticket);
    };
    let ticket = claim(&mut tx, ticket_id, agent).await?;
    tx.commit().await?;

    info!(ticket_id = %ticket_id, agent_id = %agent, "ticket auto-assigned");
    Ok(ticket)
}

/// Manual assignment to a specific agent, who must be active and available.
pub async fn assign_to(pool: &PgPool, ticket_id: Uuid, agent_id: Uuid) -> ApiResult<SupportTicket> {
    let mut tx = pool.begin().await?;
    let ticket = lock_ticket(&mut tx, ticket_id).await?;
    check_assignable(ticket.status, ticket.assigned_to)?;

    let agent: Option<(UserRole, Option<SupportAgentStatus>, bool)> = sqlx::query_as(
        r#"SELECT role, support_agent_status, is_active AND NOT is_deleted FROM users WHERE id = $1 FOR UPDATE"#,
    )
    .bind(agent_id)
    .fetch_optional(&mut *tx)
    .await?;
    match agent {
        None => return Err(ApiError::not_found("User")),
        Some((role, _, _)) if role != UserRole::SupportAgent => {
            return Err(ApiError::validation("User is not a support agent"))
        }
        Some((_, _, false)) => return Err(ApiError::validation("Support agent is not active")),
        Some((_, status, _)) if status != Some(SupportAgentStatus::Available) => {
            return Err(ApiError::Conflict("Support agent is not available".into()))
        }
        Some(_) => {}
    }
    let ticket = claim(&mut tx, ticket_id, agent_id).await?;
    tx.commit().await?;

    info!(ticket_id = %ticket_id, agent_id = %agent_id, "ticket assigned");
    Ok(ticket)
}

/// Applies the ticket status table. Entering resolved or closed for the first
/// time hands the assignee back to the pool.
pub async fn update_status(pool: &PgPool, ticket_id: Uuid, to: TicketStatus) -> ApiResult<SupportTicket> {
    let mut tx = pool.begin().await?;
    let ticket = lock_ticket(&mut tx, ticket_id).await?;
    let from = ticket.status;
    from.transition_to(to)?;

    let updated = query_as::<_, SupportTicket>(
        r#"
        UPDATE support_tickets SET
          status      = $2,
          resolved_at = CASE WHEN $2 = 'resolved'::ticket_status THEN NOW() ELSE resolved_at END,
          updated_at  = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(to)
    .fetch_one(&mut *tx)
    .await?;

    if let (true, Some(agent)) = (releases_agent(from, to), ticket.assigned_to) {
        set_agent_status(&mut tx, agent, SupportAgentStatus::Available).await?;
    }
    tx.commit().await?;

    info!(ticket_id = %ticket_id, from = %from, to = %to, "ticket status changed");
    Ok(updated)
}

async fn lock_ticket(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> ApiResult<SupportTicket> {
    query_as::<_, SupportTicket>(r#"SELECT * FROM support_tickets WHERE id = $1 FOR UPDATE"#)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket"))
}

async fn claim(tx: &mut Transaction<'_, Postgres>, ticket_id: Uuid, agent: Uuid) -> ApiResult<SupportTicket> {
    set_agent_status(tx, agent, SupportAgentStatus::Busy).await?;
    let ticket = query_as::<_, SupportTicket>(
        r#"
        UPDATE support_tickets SET assigned_to = $2, status = 'in_progress', updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(ticket_id)
    .bind(agent)
    .fetch_one(&mut **tx)
    .await?;
    Ok(ticket)
}

async fn set_agent_status(
    tx: &mut Transaction<'_, Postgres>,
    agent: Uuid,
    status: SupportAgentStatus,
) -> Result<(), sqlx::Error> {
    query(
        r#"
        UPDATE users SET support_agent_status = $2, agent_status_changed_at = NOW(), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(agent)
    .bind(status)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn notify_assignment(notifier: &Notifier, ticket: &SupportTicket, agent: Uuid) {
    notifier.send(
        Draft::new(
            Party::user(agent),
            Party::customer(ticket.customer_id),
            NotificationKind::SupportTicket,
            format!("Support ticket {} ({:?}) has been assigned to you", ticket.id, ticket.category),
        )
        .with_email("New support ticket assigned"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_body_defaults() {
        let b: CreateTicketBody = serde_json::from_value(json!({
            "category": "Payment",
            "description": "Charged twice"
        }))
        .unwrap();
        assert_eq!(b.priority, TicketPriority::Medium);
        assert!(b.attachments.is_empty());
        assert!(b.booking_id.is_none());
    }

    #[test]
    fn unknown_category_is_rejected() {
        let res = serde_json::from_value::<CreateTicketBody>(json!({
            "category": "Complaint",
            "description": "x"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn status_body_uses_snake_case() {
        let b: StatusBody = serde_json::from_value(json!({ "status": "in_progress" })).unwrap();
        assert_eq!(b.status, TicketStatus::InProgress);
    }
}
