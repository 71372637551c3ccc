#![allow(non_snake_case)]

use proptest::prelude::*;
use tarot_contract::{
    DRAW_METHOD,
    MINT_METHOD,
    TxHash,
    image_transform,
};
use tarot_reader::{
    controller::AppController,
    invoker::ContractInvoker,
    reading::ReadingGenerator,
    redirect,
    resolver::TransactionResolver,
    test_helpers::{
        FakeChain,
        FakeCompletions,
        FakeSession,
        outcome,
    },
    workflow::{
        Stage,
        ViewState,
    },
};
use tokio::runtime::Runtime;

const REDIRECT: &str =
    "http://localhost:1234/?transactionHashes=AexLFe9xBrXgEdfediyZU7cNzx6e5RQsxyGQFkkc8Js5";

struct TestContext {
    chain: FakeChain,
    completions: FakeCompletions,
}

impl TestContext {
    fn new(chain: FakeChain, reply: &str) -> Self {
        Self {
            chain,
            completions: FakeCompletions::replying(reply),
        }
    }

    fn controller(
        &self,
        session: FakeSession,
    ) -> AppController<FakeSession, FakeChain, FakeChain, FakeCompletions> {
        AppController::new(
            session,
            TransactionResolver::new(self.chain.clone()),
            ContractInvoker::new(self.chain.clone(), "tarotv0.testnet".parse().unwrap()),
            ReadingGenerator::new(self.completions.clone(), "gpt-4", Some(300)),
        )
    }
}

fn redirect_hash() -> TxHash {
    redirect::transaction_hash(REDIRECT).unwrap().unwrap()
}

#[tokio::test]
async fn redirect__resolves_draw_and_displays_reading_unrotated() {
    // given
    let hash = redirect_hash();
    let chain = FakeChain::new().with_outcome(
        &hash,
        outcome(DRAW_METHOD, Some(r#"["The Fool","ipfs://abc123","upright"]"#), &[]),
    );
    let ctx = TestContext::new(chain, "...");
    let mut app = ctx.controller(FakeSession::signed_in("alice.testnet"));

    // when
    app.load_redirect(hash, Some("What is next?".to_string())).unwrap();
    app.complete_redirect().await.unwrap();

    // then
    let ViewState::ReadingReady { completed } = app.state() else {
        panic!("expected reading-ready, got {:?}", app.state());
    };
    assert_eq!(completed.draw.card, "The Fool");
    assert_eq!(completed.draw.image_ref, "ipfs://abc123");
    assert_eq!(completed.draw.orientation, "upright");
    assert_eq!(completed.reading.text, "...");
    assert_eq!(image_transform(&completed.draw.orientation).rotation_degrees, 0);
    assert_eq!(ctx.completions.calls(), 1);
}

#[tokio::test]
async fn draw_to_mint__full_session_then_restart() {
    // given
    let draw_hash = TxHash::from_digest([1; 32]);
    let mint_hash = TxHash::from_digest([2; 32]);
    let chain = FakeChain::new()
        .with_next_hash(draw_hash.clone())
        .with_outcome(
            &draw_hash,
            outcome(DRAW_METHOD, Some(r#"["XIII Death","ipfs://cid/13.png","reverse"]"#), &[]),
        )
        .with_next_hash(mint_hash.clone())
        .with_outcome(&mint_hash, outcome(MINT_METHOD, Some(r#"{"token_id":"12"}"#), &[]));
    let ctx = TestContext::new(chain, "An ending makes room.");
    let mut app = ctx.controller(FakeSession::signed_in("alice.testnet"));

    // when
    app.request_draw("Should I move?").await.unwrap();
    app.complete_redirect().await.unwrap();
    app.request_mint().await.unwrap();

    // then
    let ViewState::Minted {
        completed,
        tx_hash,
        token_id,
    } = app.state()
    else {
        panic!("expected minted, got {:?}", app.state());
    };
    assert_eq!(tx_hash, &mint_hash);
    assert_eq!(token_id.as_deref(), Some("12"));
    assert!(image_transform(&completed.draw.orientation).is_rotated());
    let prompt = &ctx.completions.requests()[0].messages[0].content;
    assert!(prompt.contains("“XIII Death” card in “reverse” position"));

    app.restart().unwrap();
    assert_eq!(app.state(), &ViewState::Idle);
}

#[tokio::test]
async fn redirect__unknown_hash_ends_in_not_found_error() {
    // given
    let ctx = TestContext::new(FakeChain::new(), "unused");
    let mut app = ctx.controller(FakeSession::signed_in("alice.testnet"));
    app.load_redirect(redirect_hash(), Some("Anything?".to_string()))
        .unwrap();

    // when
    let err = app.complete_redirect().await.unwrap_err();

    // then
    assert!(err.to_string().contains("was not found"));
    let ViewState::Error { failure, at, .. } = app.state() else {
        panic!("expected error, got {:?}", app.state());
    };
    assert_eq!(*at, Stage::Resolving);
    assert_eq!(failure.headline(), "The transaction was not found on chain");
    assert_eq!(ctx.completions.calls(), 0);
    assert!(app.state().draw().is_none());
    assert!(app.state().can_retry());
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 20, .. ProptestConfig::default() })]
    #[test]
    fn redirect__any_orientation_reaches_reading_with_matching_rotation(
        orientation in "[a-z]{1,10}",
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            _redirect__any_orientation_reaches_reading_with_matching_rotation(orientation).await
        })?;
    }
}

async fn _redirect__any_orientation_reaches_reading_with_matching_rotation(
    orientation: String,
) -> Result<(), TestCaseError> {
    // given
    let hash = redirect_hash();
    let payload = format!(r#"["The Star","ipfs://cid/17.png","{orientation}"]"#);
    let chain = FakeChain::new().with_outcome(&hash, outcome(DRAW_METHOD, Some(&payload), &[]));
    let ctx = TestContext::new(chain, "Hope returns.");
    let mut app = ctx.controller(FakeSession::signed_in("alice.testnet"));
    app.load_redirect(hash, Some("Will it pass?".to_string()))
        .unwrap();

    // when
    app.complete_redirect().await.unwrap();

    // then
    let draw = app.state().draw().unwrap();
    prop_assert_eq!(&draw.orientation, &orientation);
    prop_assert_eq!(
        image_transform(&draw.orientation).is_rotated(),
        orientation != "upright"
    );
    Ok(())
}
