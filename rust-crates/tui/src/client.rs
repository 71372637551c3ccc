use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use tarot_contract::{
    CALL_GAS,
    DRAW_DEPOSIT,
    DrawResult,
    ImageTransform,
    MINT_DEPOSIT,
    format_near,
    image_transform,
    image_url,
};
use tarot_reader::{
    config::{
        AppConfig,
        WalletConfig,
    },
    controller::AppController,
    error::{
        ErrorKind,
        Failure,
        ReadingError,
    },
    invoker::ContractInvoker,
    near_rpc::NearRpcClient,
    reading::{
        CompletionClient,
        ReadingGenerator,
    },
    resolver::TransactionResolver,
    session::{
        KeyFileSession,
        WalletSession,
    },
    workflow::{
        Stage,
        ViewState,
    },
};
use tracing::{
    error,
    info,
    warn,
};

const MAX_NOTICES: usize = 3;

type Controller = AppController<KeyFileSession, NearRpcClient, NearRpcClient, CompletionClient>;

/// Everything the UI needs for one frame.
#[derive(Clone, Debug)]
pub struct ViewSnapshot {
    pub stage: Stage,
    pub network: String,
    pub contract: String,
    pub account: Option<String>,
    pub known_accounts: Vec<String>,
    pub draw_price: String,
    pub mint_price: String,
    pub question: Option<String>,
    pub draw: Option<DrawResult>,
    pub transform: ImageTransform,
    pub image_url: Option<String>,
    pub reading: Option<String>,
    pub tx_hash: Option<String>,
    pub token_id: Option<String>,
    pub failure: Option<Failure>,
    pub can_retry: bool,
    pub status: String,
    pub errors: Vec<String>,
}

fn build_controller(config: &AppConfig) -> Result<Controller> {
    let WalletConfig::KeyFiles { account, dir } = &config.wallets;
    let mut session = KeyFileSession::new(dir.clone(), config.network.network_id());
    if let Some(account) = account {
        session
            .request_sign_in(account)
            .wrap_err_with(|| format!("failed to sign in as {account}"))?;
    }

    let rpc = NearRpcClient::new(config.network.rpc_url(), config.request_timeout)?;
    let completions = CompletionClient::new(
        config.reading.endpoint.clone(),
        config.reading.api_key.clone(),
        config.request_timeout,
    )?;

    let mut controller = AppController::new(
        session,
        TransactionResolver::new(rpc.clone()),
        ContractInvoker::new(rpc, config.contract_id.clone()),
        ReadingGenerator::from_config(completions, &config.reading),
    );
    if let Some(resume) = &config.resume {
        controller
            .load_redirect(resume.tx_hash.clone(), resume.question.clone())
            .wrap_err("failed to load the redirect transaction")?;
    }
    Ok(controller)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut controller = build_controller(&config)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!(
        network = config.network.network_id(),
        contract = %config.contract_id,
        "Starting UI"
    );
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&config, &mut controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

/// Frame state owned by the loop: the account list and recent notices.
struct LoopState {
    known_accounts: Vec<String>,
    notices: Vec<String>,
}

impl LoopState {
    fn new(controller: &Controller) -> Self {
        let mut state = Self {
            known_accounts: Vec::new(),
            notices: Vec::new(),
        };
        state.refresh_accounts(controller);
        state
    }

    fn refresh_accounts(&mut self, controller: &Controller) {
        self.known_accounts = controller.session().known_accounts().unwrap_or_else(|e| {
            warn!(error = %e, "could not list key files");
            Vec::new()
        });
    }

    fn notice(&mut self, message: impl Into<String>) {
        let stamped = format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), message.into());
        self.notices.push(stamped);
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }
}

fn build_snapshot(config: &AppConfig, controller: &Controller, loop_state: &LoopState) -> ViewSnapshot {
    let state = controller.state();
    let draw = state.draw().cloned();
    let transform = image_transform(draw.as_ref().map_or("upright", |d| d.orientation.as_str()));
    let (tx_hash, token_id) = match state {
        ViewState::Minting {
            tx_hash: Some(tx_hash),
            ..
        } => (Some(tx_hash.to_string()), None),
        ViewState::Minted {
            tx_hash, token_id, ..
        } => (Some(tx_hash.to_string()), token_id.clone()),
        other => (other.tracked_draw().map(ToString::to_string), None),
    };
    let failure = match state {
        ViewState::Error { failure, .. } => Some(failure.clone()),
        _ => None,
    };

    ViewSnapshot {
        stage: state.stage(),
        network: config.network.network_id().to_string(),
        contract: config.contract_id.to_string(),
        account: controller.session().account_id().map(ToString::to_string),
        known_accounts: loop_state.known_accounts.clone(),
        draw_price: format!("{} + {} TGas", format_near(DRAW_DEPOSIT), CALL_GAS / 1_000_000_000_000),
        mint_price: format!("{} + {} TGas", format_near(MINT_DEPOSIT), CALL_GAS / 1_000_000_000_000),
        question: state.question().map(str::to_owned),
        image_url: draw
            .as_ref()
            .map(|d| image_url(&d.image_ref, &config.ipfs_gateway)),
        draw,
        transform,
        reading: state.completed().map(|c| c.reading.text.clone()),
        tx_hash,
        token_id,
        failure,
        can_retry: state.can_retry(),
        status: controller.status.clone(),
        errors: loop_state.notices.clone(),
    }
}

fn redraw(
    config: &AppConfig,
    controller: &Controller,
    loop_state: &LoopState,
    ui_state: &mut ui::UiState,
    context: &'static str,
) -> Result<()> {
    let snapshot = build_snapshot(config, controller, loop_state);
    ui::draw(ui_state, &snapshot).wrap_err(context)
}

fn show_processing_status(
    config: &AppConfig,
    controller: &mut Controller,
    loop_state: &LoopState,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    redraw(config, controller, loop_state, ui_state, context)
}

/// Workflow failures already live in the view state; only refused actions
/// need a notice of their own.
fn report(loop_state: &mut LoopState, action: &'static str, err: &ReadingError) {
    if err.kind() == ErrorKind::Transition {
        warn!(error = %err, action, "action refused");
        loop_state.notice(format!("{action}: {err}"));
    } else {
        error!(error = %err, action, "action failed");
    }
}

/// Resolves the tracked draw and generates its reading, redrawing between
/// the two steps.
async fn advance_redirect(
    config: &AppConfig,
    controller: &mut Controller,
    loop_state: &mut LoopState,
    ui_state: &mut ui::UiState,
) -> Result<()> {
    let tx_hash = controller
        .state()
        .tracked_draw()
        .map(ToString::to_string)
        .unwrap_or_default();
    show_processing_status(
        config,
        controller,
        loop_state,
        ui_state,
        format!("Resolving transaction {tx_hash}..."),
        "draw while resolving the draw failed",
    )?;
    if let Err(e) = controller.resolve_draw().await {
        report(loop_state, "resolve", &e);
        return Ok(());
    }

    show_processing_status(
        config,
        controller,
        loop_state,
        ui_state,
        "Consulting the cards...",
        "draw while generating the reading failed",
    )?;
    if let Err(e) = controller.generate_reading().await {
        report(loop_state, "reading", &e);
    }
    Ok(())
}

async fn run_loop(
    config: &AppConfig,
    controller: &mut Controller,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEvents,
) -> Result<()> {
    info!("Running app loop");
    let mut loop_state = LoopState::new(controller);

    if controller.ready_to_resolve() {
        advance_redirect(config, controller, &mut loop_state, ui_state).await?;
    } else if controller.state().stage() == Stage::AwaitingRedirect {
        controller.set_status("Enter the question you asked for this draw");
        ui_state.open_question();
    }
    redraw(config, controller, &loop_state, ui_state, "initial draw failed")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::AskQuestion(question) => {
                        if controller.state().stage() == Stage::AwaitingRedirect {
                            match controller.answer_question(&question) {
                                Ok(()) => {
                                    advance_redirect(config, controller, &mut loop_state, ui_state)
                                        .await?;
                                }
                                Err(e) => report(&mut loop_state, "question", &e),
                            }
                        } else {
                            if controller.session().is_signed_in() {
                                show_processing_status(
                                    config,
                                    controller,
                                    &loop_state,
                                    ui_state,
                                    format!("Submitting draw ({})...", format_near(DRAW_DEPOSIT)),
                                    "draw while submitting the draw failed",
                                )?;
                            }
                            match controller.request_draw(&question).await {
                                Ok(()) if controller.ready_to_resolve() => {
                                    advance_redirect(config, controller, &mut loop_state, ui_state)
                                        .await?;
                                }
                                Ok(()) => {}
                                Err(e) => report(&mut loop_state, "draw", &e),
                            }
                        }
                    }
                    ui::UserEvent::SignIn(account) => {
                        if let Err(e) = controller.sign_in(&account) {
                            error!(error = %e, %account, "sign in failed");
                            loop_state.notice(format!("Sign in failed: {e}"));
                        }
                        loop_state.refresh_accounts(controller);
                    }
                    ui::UserEvent::SignOut => controller.sign_out(),
                    ui::UserEvent::Mint => {
                        if controller.state().stage() == Stage::ReadingReady
                            && controller.session().is_signed_in()
                        {
                            show_processing_status(
                                config,
                                controller,
                                &loop_state,
                                ui_state,
                                format!("Minting reading ({})...", format_near(MINT_DEPOSIT)),
                                "draw while minting failed",
                            )?;
                        }
                        if let Err(e) = controller.request_mint().await {
                            report(&mut loop_state, "mint", &e);
                        }
                    }
                    ui::UserEvent::Retry => match controller.retry() {
                        Ok(()) => match controller.state().stage() {
                            Stage::AwaitingRedirect => {
                                advance_redirect(config, controller, &mut loop_state, ui_state)
                                    .await?;
                            }
                            Stage::Minting => {
                                show_processing_status(
                                    config,
                                    controller,
                                    &loop_state,
                                    ui_state,
                                    "Checking the mint transaction...",
                                    "draw while checking the mint failed",
                                )?;
                                if let Err(e) = controller.confirm_mint().await {
                                    report(&mut loop_state, "mint", &e);
                                }
                            }
                            _ => {}
                        },
                        Err(e) => report(&mut loop_state, "retry", &e),
                    },
                    ui::UserEvent::Restart => {
                        match controller.restart() {
                            Ok(()) => loop_state.notices.clear(),
                            Err(e) => report(&mut loop_state, "restart", &e),
                        }
                    }
                    ui::UserEvent::DismissWallet => {
                        if let Err(e) = controller.dismiss_wallet_prompt() {
                            report(&mut loop_state, "wallet prompt", &e);
                        }
                    }
                }
                redraw(config, controller, &loop_state, ui_state, "draw after input failed")?;
            }
        }
    }
    Ok(())
}
