//! Circulation orchestrator: the seven circulation actions.
//!
//! Each action loads the item, its active loan and its request queue, checks
//! guards (organisation, blocks, policy, limits), runs the state machine and
//! returns the changed records. Nothing is written here; the caller commits
//! the changeset of an applied outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use snowflaked::sync::Generator;

use crate::{
    config::CirculationConfig,
    error::{CirculationError, CirculationResult, ForbiddenReason, RequestRestriction},
    models::{
        circulation::{
            ActionContext, ActionOutcome, CancelParams, CheckoutParams, CirculationReport,
            LoanParams, NoActionReason, RequestParams, SideEffect,
        },
        enums::{ItemStatus, LoanAction, LoanState, NotificationKind},
        item::Item,
        loan::{Loan, NewLoan},
        patron::{Patron, PatronType},
        policy::CirculationPolicy,
    },
    repository::Repository,
    services::{
        calendar::Calendar,
        policy::{PolicyKey, PolicyResolver},
    },
};

use super::{
    due_date,
    limits::{ExtendCandidate, LimitEnforcer, PatronActivity},
    queue::RequestQueue,
    state_machine::{transition, LoanEvent, Step},
    transit::{self, CheckinRoute, Destination},
};

/// Item, active loan and queue as read at the start of an action
struct Scene {
    item: Item,
    transaction_library_id: i32,
    active: Option<Loan>,
    queue: RequestQueue,
}

/// Records changed by an action, before versions are bumped
struct Draft {
    action: LoanAction,
    item: Item,
    loan: Option<Loan>,
    cascaded: Option<Loan>,
    side_effects: Vec<SideEffect>,
}

impl Draft {
    fn new(action: LoanAction, item: Item) -> Self {
        Self {
            action,
            item,
            loan: None,
            cascaded: None,
            side_effects: Vec::new(),
        }
    }

    fn notify(&mut self, kind: NotificationKind, loan_id: i64) {
        self.side_effects.push(SideEffect::Notify { kind, loan_id });
    }

    fn applied(mut self) -> ActionOutcome {
        self.item.version += 1;
        for loan in self.loan.iter_mut().chain(self.cascaded.iter_mut()) {
            loan.version += 1;
        }
        ActionOutcome::Applied(CirculationReport {
            action: self.action,
            item: self.item,
            loan: self.loan,
            cascaded: self.cascaded,
            side_effects: self.side_effects,
        })
    }
}

fn no_action(reason: NoActionReason) -> CirculationResult<ActionOutcome> {
    Ok(ActionOutcome::NoAction { reason })
}

fn stamp(loan: &mut Loan, ctx: &ActionContext, transaction_library_id: i32) {
    loan.transaction_location_id = ctx.transaction_location_id;
    loan.transaction_library_id = transaction_library_id;
    loan.transaction_user_id = ctx.transaction_user_id;
    loan.transaction_date = ctx.transaction_date;
}

fn moved(step: Step, action: LoanAction, state: LoanState) -> CirculationResult<(LoanState, Option<ItemStatus>)> {
    match step {
        Step::Moved(t) => Ok((t.to, t.item_status)),
        Step::Stay(_) => Err(CirculationError::Internal(format!(
            "{} of a {} loan did not move it",
            action, state
        ))),
    }
}

fn ensure_loan_matches(requested: Option<i64>, loan: &Loan) -> CirculationResult<()> {
    match requested {
        Some(id) if id != loan.id => Err(CirculationError::Validation(format!(
            "Loan {} is not the current loan of item {}",
            id, loan.item_id
        ))),
        _ => Ok(()),
    }
}

pub struct CirculationOrchestrator {
    repository: Repository,
    policies: Arc<PolicyResolver>,
    calendar: Arc<dyn Calendar>,
    ids: Generator,
    request_expiration_days: u32,
}

impl CirculationOrchestrator {
    pub fn new(
        repository: Repository,
        policies: Arc<PolicyResolver>,
        calendar: Arc<dyn Calendar>,
        config: &CirculationConfig,
    ) -> Self {
        Self {
            repository,
            policies,
            calendar,
            ids: Generator::new(config.instance_id),
            request_expiration_days: config.request_expiration_days,
        }
    }

    // ---------------------------------------------------------------------
    // Shared loading and guards
    // ---------------------------------------------------------------------

    async fn load_scene(&self, ctx: &ActionContext, item_id: i32) -> CirculationResult<Scene> {
        let item = self.repository.items.get_item(item_id).await?;
        if item.organisation_id != ctx.organisation_id {
            return Err(CirculationError::Forbidden(
                ForbiddenReason::OrganisationMismatch,
            ));
        }
        if let Some(expected) = ctx.expected_item_version {
            if expected != item.version {
                return Err(CirculationError::ConcurrentModification {
                    entity: "item",
                    id: i64::from(item.id),
                });
            }
        }

        let location = self
            .repository
            .locations
            .get_location(ctx.transaction_location_id)
            .await?;
        let active = self.repository.items.get_active_loan(item_id).await?;
        let pending = self.repository.loans.find_pending_by_item(item_id).await?;

        Ok(Scene {
            item,
            transaction_library_id: location.library_id,
            active,
            queue: RequestQueue::from_loans(item_id, pending),
        })
    }

    async fn load_patron(
        &self,
        ctx: &ActionContext,
        patron_id: i32,
    ) -> CirculationResult<(Patron, PatronType)> {
        let patron = self.repository.patrons.get_patron(patron_id).await?;
        if patron.organisation_id != ctx.organisation_id {
            return Err(CirculationError::Forbidden(
                ForbiddenReason::OrganisationMismatch,
            ));
        }
        let patron_type = self
            .repository
            .patrons
            .get_patron_type(patron.patron_type_id)
            .await?;
        Ok((patron, patron_type))
    }

    async fn activity(
        &self,
        patron_id: i32,
        library_id: i32,
        at: DateTime<Utc>,
    ) -> CirculationResult<PatronActivity> {
        let loans = self
            .repository
            .loans
            .find_by_patron(patron_id, &[LoanState::ItemOnLoan])
            .await?;
        let fees = self.repository.patrons.unpaid_fee_total(patron_id).await?;
        Ok(PatronActivity::from_loans(&loans, library_id, at, fees))
    }

    async fn policy(
        &self,
        ctx: &ActionContext,
        item: &Item,
        library_id: i32,
        patron_type_id: i32,
    ) -> CirculationResult<Arc<CirculationPolicy>> {
        self.policies
            .resolve(PolicyKey {
                organisation_id: item.organisation_id,
                library_id,
                patron_type_id,
                item_type_id: item.effective_item_type_id(ctx.transaction_date.date_naive()),
            })
            .await
    }

    /// Validate a pending request towards `destination`, returning the new item status.
    ///
    /// Only the queue head may be validated; any other loan is an invalid transition.
    fn activate(
        &self,
        ctx: &ActionContext,
        transaction_library_id: i32,
        head: &mut Loan,
        destination: Destination,
        is_queue_head: bool,
        draft: &mut Draft,
    ) -> CirculationResult<ItemStatus> {
        let step = transition(
            head.state,
            LoanEvent::Validate {
                is_queue_head,
                destination,
            },
        )?;
        let (to, status) = moved(step, LoanAction::Validate, head.state)?;
        head.state = to;
        stamp(head, ctx, transaction_library_id);

        match destination {
            Destination::Desk => {
                self.open_desk_window(ctx, head)?;
                draft.notify(NotificationKind::Availability, head.id);
            }
            Destination::TransitForPickup => {
                draft.notify(NotificationKind::TransitNotice, head.id);
            }
        }
        status.ok_or_else(|| CirculationError::Internal("Validate without item status".to_string()))
    }

    fn open_desk_window(&self, ctx: &ActionContext, loan: &mut Loan) -> CirculationResult<()> {
        let library_id = loan.pickup_library_id.unwrap_or(loan.transaction_library_id);
        loan.request_expire_date = Some(due_date::request_expire_date(
            self.calendar.as_ref(),
            library_id,
            ctx.transaction_date,
            self.request_expiration_days,
        )?);
        Ok(())
    }

    /// Hand the item over to the queue head or let it rest
    fn release(
        &self,
        ctx: &ActionContext,
        scene: &Scene,
        route: CheckinRoute,
        draft: &mut Draft,
    ) -> CirculationResult<()> {
        match route {
            CheckinRoute::NextRequest(destination) => {
                let mut head = scene.queue.peek_head().cloned().ok_or_else(|| {
                    CirculationError::Internal("Routed to an empty queue".to_string())
                })?;
                draft.item.status = self.activate(
                    ctx,
                    scene.transaction_library_id,
                    &mut head,
                    destination,
                    true,
                    draft,
                )?;
                tracing::debug!(
                    "Request {} of item {} activated as {}",
                    head.id,
                    draft.item.id,
                    head.state
                );
                draft.cascaded = Some(head);
            }
            resting => {
                if let Some(status) = resting.resting_status() {
                    draft.item.status = status;
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Request
    // ---------------------------------------------------------------------

    pub async fn request(
        &self,
        ctx: &ActionContext,
        params: &RequestParams,
    ) -> CirculationResult<ActionOutcome> {
        let mut scene = self.load_scene(ctx, params.item_id).await?;
        let (patron, patron_type) = self.load_patron(ctx, params.patron_id).await?;
        LimitEnforcer::ensure_not_blocked(&patron)?;

        let item = &scene.item;
        if item.status == ItemStatus::Missing {
            return Err(CirculationError::RequestNotAllowed(
                RequestRestriction::ItemMissing,
            ));
        }
        let today = ctx.transaction_date.date_naive();
        let shelf = self
            .repository
            .locations
            .get_location(item.effective_location_id(today))
            .await?;
        if !shelf.allow_request {
            return Err(CirculationError::RequestNotAllowed(
                RequestRestriction::LocationDisallowsRequests,
            ));
        }
        let pickup = self
            .repository
            .locations
            .get_location(params.pickup_location_id)
            .await?;
        if !pickup.is_pickup {
            return Err(CirculationError::RequestNotAllowed(
                RequestRestriction::NotAPickupLocation,
            ));
        }

        let policy = self
            .policy(ctx, item, item.library_id, patron_type.id)
            .await?;
        if !policy.allow_requests {
            return Err(CirculationError::RequestNotAllowed(
                RequestRestriction::PolicyDisallowsRequests,
            ));
        }

        let duplicate = self
            .repository
            .loans
            .find_by_patron_and_item(patron.id, item.id, &LoanState::NON_TERMINAL)
            .await?;
        let borrowed_by_patron = scene
            .active
            .as_ref()
            .map(|l| l.patron_id == patron.id)
            .unwrap_or(false);
        if duplicate.is_some() || borrowed_by_patron {
            return Err(CirculationError::DuplicateRequest {
                item_id: item.id,
                patron_id: patron.id,
            });
        }

        let activity = self
            .activity(patron.id, scene.transaction_library_id, ctx.transaction_date)
            .await?;
        LimitEnforcer::new(ctx.override_blocking).check_request(
            &patron_type.limits,
            &activity,
            scene.transaction_library_id,
        )?;

        let mut loan = Loan::created(
            NewLoan {
                id: self.ids.generate::<i64>(),
                item_id: item.id,
                patron_id: patron.id,
                organisation_id: item.organisation_id,
                pickup_location_id: pickup.id,
                pickup_library_id: pickup.library_id,
            },
            ctx.transaction_location_id,
            scene.transaction_library_id,
            ctx.transaction_user_id,
            ctx.transaction_date,
        );
        let (to, _) = moved(
            transition(loan.state, LoanEvent::Request)?,
            LoanAction::Request,
            loan.state,
        )?;
        loan.state = to;
        loan.request_creation_date = Some(ctx.transaction_date);

        let position = scene.queue.enqueue(loan.clone())?;
        tracing::info!(
            "Patron {} requested item {} (position {})",
            patron.id,
            item.id,
            position
        );

        let mut draft = Draft::new(LoanAction::Request, scene.item);
        match &scene.active {
            Some(active) if active.state == LoanState::ItemOnLoan => {
                draft.notify(NotificationKind::Recall, active.id);
            }
            None if position == 1 && draft.item.is_available() => {
                draft.notify(NotificationKind::Request, loan.id);
            }
            _ => {}
        }
        draft.loan = Some(loan);
        Ok(draft.applied())
    }

    // ---------------------------------------------------------------------
    // Validate
    // ---------------------------------------------------------------------

    pub async fn validate(
        &self,
        ctx: &ActionContext,
        params: &LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let scene = self.load_scene(ctx, params.item_id).await?;
        if let Some(active) = &scene.active {
            return Err(CirculationError::InvalidTransition {
                action: LoanAction::Validate,
                state: Some(active.state),
            });
        }
        let Some(head) = scene.queue.peek_head() else {
            return no_action(NoActionReason::NoPendingRequest);
        };

        let mut target = match params.loan_id {
            Some(id) if id != head.id => match scene.queue.iter().find(|l| l.id == id) {
                Some(queued) => queued.clone(),
                None => self.repository.loans.get_loan(id).await?,
            },
            _ => head.clone(),
        };
        let is_queue_head = target.id == head.id;

        let destination = transit::on_validate(target.pickup_library_id, scene.transaction_library_id);
        let mut draft = Draft::new(LoanAction::Validate, scene.item.clone());
        draft.item.status = self.activate(
            ctx,
            scene.transaction_library_id,
            &mut target,
            destination,
            is_queue_head,
            &mut draft,
        )?;
        tracing::info!("Request {} validated: {}", target.id, target.state);
        draft.loan = Some(target);
        Ok(draft.applied())
    }

    // ---------------------------------------------------------------------
    // Checkout
    // ---------------------------------------------------------------------

    pub async fn checkout(
        &self,
        ctx: &ActionContext,
        params: &CheckoutParams,
    ) -> CirculationResult<ActionOutcome> {
        let scene = self.load_scene(ctx, params.item_id).await?;
        let (patron, patron_type) = self.load_patron(ctx, params.patron_id).await?;
        LimitEnforcer::ensure_not_blocked(&patron)?;

        if scene.item.status == ItemStatus::Missing {
            return Err(CirculationError::InvalidTransition {
                action: LoanAction::Checkout,
                state: None,
            });
        }

        let mut loan = match &scene.active {
            Some(active) => match active.state {
                LoanState::ItemAtDesk | LoanState::ItemInTransitForPickup => {
                    ensure_loan_matches(params.loan_id, active)?;
                    active.clone()
                }
                state => {
                    return Err(CirculationError::InvalidTransition {
                        action: LoanAction::Checkout,
                        state: Some(state),
                    })
                }
            },
            None => match scene.queue.peek_head() {
                Some(head) if head.patron_id == patron.id => head.clone(),
                Some(_) if scene.queue.find_by_patron(patron.id).is_some() => {
                    return Err(CirculationError::Forbidden(ForbiddenReason::NotQueueHead))
                }
                Some(_) => {
                    return Err(CirculationError::Forbidden(
                        ForbiddenReason::ItemRequestedByOther,
                    ))
                }
                None => {
                    let pickup_location_id = params
                        .pickup_location_id
                        .unwrap_or(ctx.transaction_location_id);
                    let pickup = self
                        .repository
                        .locations
                        .get_location(pickup_location_id)
                        .await?;
                    Loan::created(
                        NewLoan {
                            id: self.ids.generate::<i64>(),
                            item_id: scene.item.id,
                            patron_id: patron.id,
                            organisation_id: scene.item.organisation_id,
                            pickup_location_id: pickup.id,
                            pickup_library_id: pickup.library_id,
                        },
                        ctx.transaction_location_id,
                        scene.transaction_library_id,
                        ctx.transaction_user_id,
                        ctx.transaction_date,
                    )
                }
            },
        };

        let step = transition(
            loan.state,
            LoanEvent::Checkout {
                is_requester: loan.patron_id == patron.id,
            },
        )?;
        let (to, status) = moved(step, LoanAction::Checkout, loan.state)?;

        let library_id = scene.transaction_library_id;
        let policy = self
            .policy(ctx, &scene.item, library_id, patron_type.id)
            .await?;
        let activity = self
            .activity(patron.id, library_id, ctx.transaction_date)
            .await?;
        LimitEnforcer::new(ctx.override_blocking).check_checkout(
            &patron_type.limits,
            &activity,
            library_id,
            &policy,
        )?;
        if ctx.override_blocking {
            tracing::warn!(
                "Checkout of item {} to patron {} with limits overridden by user {}",
                scene.item.id,
                patron.id,
                ctx.transaction_user_id
            );
        }

        let end = due_date::end_date(
            self.calendar.as_ref(),
            library_id,
            ctx.transaction_date,
            policy.checkout_duration,
        )?;

        loan.state = to;
        stamp(&mut loan, ctx, library_id);
        loan.checkout_location_id = Some(ctx.transaction_location_id);
        loan.checkout_library_id = Some(library_id);
        loan.start_date = Some(ctx.transaction_date);
        loan.set_end_date(end);
        loan.extension_count = 0;
        tracing::info!(
            "Item {} checked out to patron {} until {}",
            scene.item.id,
            patron.id,
            end
        );

        let mut draft = Draft::new(LoanAction::Checkout, scene.item);
        if let Some(status) = status {
            draft.item.status = status;
        }
        draft.loan = Some(loan);
        Ok(draft.applied())
    }

    // ---------------------------------------------------------------------
    // Checkin
    // ---------------------------------------------------------------------

    pub async fn checkin(
        &self,
        ctx: &ActionContext,
        params: &LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let scene = self.load_scene(ctx, params.item_id).await?;

        let Some(active) = scene.active.clone() else {
            return self.checkin_without_loan(ctx, scene);
        };
        ensure_loan_matches(params.loan_id, &active)?;

        match active.state {
            LoanState::ItemOnLoan => self.checkin_on_loan(ctx, scene, active).await,
            LoanState::ItemInTransitForPickup | LoanState::ItemInTransitToHouse => {
                self.receive_loan(ctx, scene, active, LoanAction::Checkin)
            }
            state => match transition(state, LoanEvent::Checkin { route: CheckinRoute::Shelf })? {
                Step::Stay(reason) => no_action(reason),
                Step::Moved(_) => Err(CirculationError::Internal(format!(
                    "Checkin of a {} loan",
                    state
                ))),
            },
        }
    }

    async fn checkin_on_loan(
        &self,
        ctx: &ActionContext,
        scene: Scene,
        mut loan: Loan,
    ) -> CirculationResult<ActionOutcome> {
        let route = transit::on_checkin(
            scene.item.library_id,
            scene.transaction_library_id,
            scene.queue.peek_head(),
        );
        let step = transition(loan.state, LoanEvent::Checkin { route })?;
        let (to, status) = moved(step, LoanAction::Checkin, loan.state)?;

        let mut draft = Draft::new(LoanAction::Checkin, scene.item.clone());

        if loan.is_overdue(ctx.transaction_date) {
            let patron = self.repository.patrons.get_patron(loan.patron_id).await?;
            let library_id = loan.checkout_library_id.unwrap_or(scene.item.library_id);
            let policy = self
                .policy(ctx, &scene.item, library_id, patron.patron_type_id)
                .await?;
            if policy.overdue_fees.is_some() {
                let overdue_days = loan.overdue_days(ctx.transaction_date);
                tracing::info!("Loan {} returned {} day(s) late", loan.id, overdue_days);
                draft.side_effects.push(SideEffect::CreateFee {
                    loan_id: loan.id,
                    overdue_days,
                });
            }
        }

        loan.state = to;
        stamp(&mut loan, ctx, scene.transaction_library_id);
        loan.set_end_date(ctx.transaction_date);
        if let Some(status) = status {
            draft.item.status = status;
        }
        if route == CheckinRoute::TransitToHouse {
            draft.notify(NotificationKind::TransitNotice, loan.id);
        }
        self.release(ctx, &scene, route, &mut draft)?;

        tracing::info!("Item {} checked in: loan {} is {}", scene.item.id, loan.id, loan.state);
        draft.loan = Some(loan);
        Ok(draft.applied())
    }

    fn checkin_without_loan(
        &self,
        ctx: &ActionContext,
        scene: Scene,
    ) -> CirculationResult<ActionOutcome> {
        match scene.item.status {
            ItemStatus::InTransit => self.receive_without_loan(ctx, scene, LoanAction::Checkin),
            ItemStatus::OnShelf | ItemStatus::Missing => {
                let at_home = scene.transaction_library_id == scene.item.library_id;
                let mut draft = Draft::new(LoanAction::Checkin, scene.item.clone());

                if let Some(head) = scene.queue.peek_head() {
                    let destination =
                        transit::on_validate(head.pickup_library_id, scene.transaction_library_id);
                    self.release(ctx, &scene, CheckinRoute::NextRequest(destination), &mut draft)?;
                } else if at_home {
                    if scene.item.status == ItemStatus::OnShelf {
                        return no_action(NoActionReason::ItemOnShelf);
                    }
                    tracing::info!("Missing item {} found", scene.item.id);
                    draft.item.status = ItemStatus::OnShelf;
                } else {
                    draft.item.status = ItemStatus::InTransit;
                }
                Ok(draft.applied())
            }
            status => Err(CirculationError::Internal(format!(
                "Item {} is {} without an active loan",
                scene.item.id, status
            ))),
        }
    }

    // ---------------------------------------------------------------------
    // Receive
    // ---------------------------------------------------------------------

    pub async fn receive(
        &self,
        ctx: &ActionContext,
        params: &LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let scene = self.load_scene(ctx, params.item_id).await?;
        match scene.active.clone() {
            Some(loan)
                if matches!(
                    loan.state,
                    LoanState::ItemInTransitForPickup | LoanState::ItemInTransitToHouse
                ) =>
            {
                ensure_loan_matches(params.loan_id, &loan)?;
                self.receive_loan(ctx, scene, loan, LoanAction::Receive)
            }
            Some(_) => no_action(NoActionReason::ItemNotInTransit),
            None if scene.item.status == ItemStatus::InTransit => {
                self.receive_without_loan(ctx, scene, LoanAction::Receive)
            }
            None => no_action(NoActionReason::ItemNotInTransit),
        }
    }

    fn receive_loan(
        &self,
        ctx: &ActionContext,
        scene: Scene,
        mut loan: Loan,
        action: LoanAction,
    ) -> CirculationResult<ActionOutcome> {
        let destination = match loan.state {
            LoanState::ItemInTransitForPickup => loan.pickup_library_id,
            _ => Some(scene.item.library_id),
        };
        let arrived = transit::on_receive(destination, scene.transaction_library_id);
        let from = loan.state;
        let (to, status) = match transition(from, LoanEvent::Receive { arrived })? {
            Step::Stay(reason) => return no_action(reason),
            Step::Moved(t) => (t.to, t.item_status),
        };

        let mut draft = Draft::new(action, scene.item.clone());
        loan.state = to;
        stamp(&mut loan, ctx, scene.transaction_library_id);
        if let Some(status) = status {
            draft.item.status = status;
        }

        if from == LoanState::ItemInTransitForPickup {
            self.open_desk_window(ctx, &mut loan)?;
            draft.notify(NotificationKind::Availability, loan.id);
        } else if let Some(head) = scene.queue.peek_head() {
            let destination = transit::on_validate(head.pickup_library_id, scene.item.library_id);
            self.release(ctx, &scene, CheckinRoute::NextRequest(destination), &mut draft)?;
        }

        tracing::info!("Item {} received: loan {} is {}", scene.item.id, loan.id, loan.state);
        draft.loan = Some(loan);
        Ok(draft.applied())
    }

    fn receive_without_loan(
        &self,
        ctx: &ActionContext,
        scene: Scene,
        action: LoanAction,
    ) -> CirculationResult<ActionOutcome> {
        if scene.transaction_library_id != scene.item.library_id {
            return no_action(NoActionReason::NotAtDestination);
        }
        let mut draft = Draft::new(action, scene.item.clone());
        let route = match scene.queue.peek_head() {
            Some(head) => CheckinRoute::NextRequest(transit::on_validate(
                head.pickup_library_id,
                scene.item.library_id,
            )),
            None => CheckinRoute::Shelf,
        };
        self.release(ctx, &scene, route, &mut draft)?;
        Ok(draft.applied())
    }

    // ---------------------------------------------------------------------
    // Extend
    // ---------------------------------------------------------------------

    pub async fn extend(
        &self,
        ctx: &ActionContext,
        params: &LoanParams,
    ) -> CirculationResult<ActionOutcome> {
        let scene = self.load_scene(ctx, params.item_id).await?;
        let Some(mut loan) = scene.active.clone() else {
            return no_action(NoActionReason::NoActiveLoan);
        };
        ensure_loan_matches(params.loan_id, &loan)?;
        let (to, _) = moved(
            transition(loan.state, LoanEvent::Extend)?,
            LoanAction::Extend,
            loan.state,
        )?;

        let (patron, patron_type) = self.load_patron(ctx, loan.patron_id).await?;
        let policy_library = loan.checkout_library_id.unwrap_or(scene.item.library_id);
        let policy = self
            .policy(ctx, &scene.item, policy_library, patron_type.id)
            .await?;
        let new_end = due_date::end_date(
            self.calendar.as_ref(),
            scene.transaction_library_id,
            ctx.transaction_date,
            policy.renewal_duration,
        )?;
        let activity = self
            .activity(patron.id, scene.transaction_library_id, ctx.transaction_date)
            .await?;
        LimitEnforcer::new(ctx.override_blocking).check_extend(
            &patron_type.limits,
            &activity,
            &policy,
            ExtendCandidate {
                loan: &loan,
                has_requests: !scene.queue.is_empty(),
                new_end_date: new_end,
            },
        )?;

        loan.state = to;
        stamp(&mut loan, ctx, scene.transaction_library_id);
        loan.set_end_date(new_end);
        loan.extension_count += 1;
        tracing::info!(
            "Loan {} extended until {} ({} renewal(s))",
            loan.id,
            new_end,
            loan.extension_count
        );

        let mut draft = Draft::new(LoanAction::Extend, scene.item);
        draft.loan = Some(loan);
        Ok(draft.applied())
    }

    // ---------------------------------------------------------------------
    // Cancel
    // ---------------------------------------------------------------------

    pub async fn cancel(
        &self,
        ctx: &ActionContext,
        params: &CancelParams,
    ) -> CirculationResult<ActionOutcome> {
        let mut scene = self.load_scene(ctx, params.item_id).await?;
        let mut loan = self.repository.loans.get_loan(params.loan_id).await?;
        if loan.item_id != scene.item.id {
            return Err(CirculationError::Validation(format!(
                "Loan {} does not belong to item {}",
                loan.id, scene.item.id
            )));
        }
        if let Some(patron_id) = params.patron_id {
            if patron_id != loan.patron_id {
                return Err(CirculationError::Forbidden(ForbiddenReason::NotLoanOwner));
            }
        }

        let from = loan.state;
        let (to, _) = moved(transition(from, LoanEvent::Cancel)?, LoanAction::Cancel, from)?;
        let mut draft = Draft::new(LoanAction::Cancel, scene.item.clone());

        let owning = scene.item.library_id;
        match from {
            LoanState::Pending => {
                scene.queue.remove(loan.id);
                tracing::debug!(
                    "{} request(s) left on item {}",
                    scene.queue.count(),
                    scene.item.id
                );
            }
            LoanState::ItemAtDesk => {
                let desk = loan.pickup_library_id.unwrap_or(owning);
                let route = transit::on_cancel_at_desk(owning, desk, scene.queue.peek_head());
                self.release(ctx, &scene, route, &mut draft)?;
            }
            _ => {
                let route = transit::on_cancel_in_transit(
                    owning,
                    scene.transaction_library_id,
                    scene.queue.peek_head(),
                );
                self.release(ctx, &scene, route, &mut draft)?;
            }
        }

        loan.state = to;
        stamp(&mut loan, ctx, scene.transaction_library_id);
        tracing::info!("Loan {} cancelled (was {})", loan.id, from);
        draft.loan = Some(loan);
        Ok(draft.applied())
    }
}
