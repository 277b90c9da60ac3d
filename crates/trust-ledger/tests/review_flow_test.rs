//! End-to-end tests for the review ledger flow.
//!
//! Drives review transactions through the whole pipeline against the
//! in-memory ledger:
//! 1. Review submission
//! 2. Signing and assembly
//! 3. Submission and indexing
//! 4. Upvotes, including two voters racing for the same record
//! 5. Reputation

use trust_ledger::{
    AssemblyInput, Digest32, InMemoryLedger, KeyWallet, LedgerConfig, LedgerError,
    Lovelace, Network, OutputRef, PendingTransaction, PipelineStage, ReviewLedger, TxHash,
    UnsignedTransaction, Utxo, ValidatorScript, WitnessSet, assemble, decode_balance_hex,
    product_id_for_sku, review_content_hash,
};

const SCRIPT_CODE: &str = "4e4d01000033222220051200120011";

// ============================================================================
// Helper Functions
// ============================================================================

fn validator() -> ValidatorScript {
    ValidatorScript::from_compiled(hex::decode(SCRIPT_CODE).expect("hex")).expect("script")
}

fn client_for(ledger: &InMemoryLedger) -> ReviewLedger<InMemoryLedger> {
    ReviewLedger::new(ledger.clone(), LedgerConfig::default(), Some(validator())).expect("client")
}

async fn funded_wallet(ledger: &InMemoryLedger, ada: &[u64]) -> KeyWallet {
    let wallet = KeyWallet::generate().expect("should generate");
    for amount in ada {
        ledger
            .fund(&wallet.address(Network::Preprod), Lovelace::from_ada(*amount))
            .await;
    }
    wallet
}

async fn sign_and_submit(
    client: &ReviewLedger<InMemoryLedger>,
    wallet: &KeyWallet,
    unsigned: UnsignedTransaction,
) -> trust_ledger::Result<TxHash> {
    let mut pending = PendingTransaction::new(unsigned);
    pending.sign_with(wallet).await?;
    pending.assemble()?;
    pending.submit(client.provider()).await
}

async fn submit_review(
    client: &ReviewLedger<InMemoryLedger>,
    wallet: &KeyWallet,
    sku: &str,
    rating: u8,
) -> OutputRef {
    let product = product_id_for_sku(sku);
    let unsigned = client
        .build_submission(
            &wallet.address(Network::Preprod),
            wallet.key_hash(),
            product,
            rating,
            review_content_hash(&product, rating, "solid product"),
        )
        .await
        .expect("build submission");
    let hash = sign_and_submit(client, wallet, unsigned)
        .await
        .expect("submit review");
    OutputRef::new(hash, 0)
}

// ============================================================================
// Phase 1: Submission Through the Pipeline
// ============================================================================

#[tokio::test]
async fn submission_passes_every_stage() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let wallet = funded_wallet(&ledger, &[10]).await;
    let product = product_id_for_sku("SKU-1001");

    let unsigned = client
        .build_submission(
            &wallet.address(Network::Preprod),
            wallet.key_hash(),
            product,
            5,
            review_content_hash(&product, 5, "great"),
        )
        .await
        .expect("build");
    let mut pending = PendingTransaction::new(unsigned);
    assert_eq!(pending.stage(), PipelineStage::Built);

    pending.sign_with(&wallet).await.expect("sign");
    assert_eq!(pending.stage(), PipelineStage::Signed);

    pending.assemble().expect("assemble");
    assert_eq!(pending.stage(), PipelineStage::Assembled);

    let hash = pending.submit(client.provider()).await.expect("submit");
    assert_eq!(pending.stage(), PipelineStage::Submitted);
    assert_eq!(hash, pending.id());

    let reviews = client.reviews_for_product(&product).await.expect("query");
    assert_eq!(reviews.len(), 1);
    let datum = &reviews[0].datum;
    assert_eq!(datum.rating, 5);
    assert_eq!(datum.reviewer, wallet.key_hash());
    assert_eq!((datum.upvotes, datum.flags, datum.verified), (0, 0, false));
    assert_eq!(reviews[0].value.coin, Lovelace::from_ada(2));
}

#[tokio::test]
async fn rating_out_of_range_is_rejected_before_funds_are_touched() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let wallet = funded_wallet(&ledger, &[10]).await;

    for rating in [0u8, 6] {
        let err = client
            .build_submission(
                &wallet.address(Network::Preprod),
                wallet.key_hash(),
                Digest32::new([1; 32]),
                rating,
                Digest32::new([2; 32]),
            )
            .await
            .expect_err("invalid rating");
        assert!(matches!(err, LedgerError::Validation { .. }));
    }
}

#[tokio::test]
async fn pipeline_survives_serialization_between_build_and_sign() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let wallet = funded_wallet(&ledger, &[10]).await;
    let product = product_id_for_sku("SKU-2002");

    let unsigned = client
        .build_submission(
            &wallet.address(Network::Preprod),
            wallet.key_hash(),
            product,
            3,
            review_content_hash(&product, 3, "fine"),
        )
        .await
        .expect("build");
    let saved = PendingTransaction::new(unsigned).to_json().expect("serialize");

    // Later, possibly in another process.
    let mut resumed = PendingTransaction::from_json(&saved).expect("resume");
    resumed.sign_with(&wallet).await.expect("sign");
    resumed.assemble().expect("assemble");
    resumed.submit(client.provider()).await.expect("submit");
    assert_eq!(client.reviews_for_product(&product).await.expect("query").len(), 1);
}

// ============================================================================
// Phase 2: Assembly
// ============================================================================

#[tokio::test]
async fn assembly_is_deterministic() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let wallet = funded_wallet(&ledger, &[10]).await;
    let unsigned = client
        .build_submission(
            &wallet.address(Network::Preprod),
            wallet.key_hash(),
            Digest32::new([1; 32]),
            4,
            Digest32::new([2; 32]),
        )
        .await
        .expect("build");
    let input = AssemblyInput::Parts {
        unsigned: unsigned.clone(),
        witnesses: WitnessSet::new(vec![wallet.witness(&unsigned)]),
    };

    let first = assemble(&input).expect("first");
    let second = assemble(&input).expect("second");
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(first.id(), unsigned.id());

    // A finalized transaction is accepted unchanged.
    let passthrough = assemble(&AssemblyInput::Signed(first.as_bytes().to_vec())).expect("signed");
    assert_eq!(passthrough, first);
}

#[tokio::test]
async fn assembly_rejects_signature_from_wrong_key() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let required = funded_wallet(&ledger, &[10]).await;
    let stranger = KeyWallet::generate().expect("should generate");
    let unsigned = client
        .build_submission(
            &required.address(Network::Preprod),
            required.key_hash(),
            Digest32::new([1; 32]),
            4,
            Digest32::new([2; 32]),
        )
        .await
        .expect("build");

    let err = assemble(&AssemblyInput::Parts {
        witnesses: WitnessSet::new(vec![stranger.witness(&unsigned)]),
        unsigned,
    })
    .expect_err("wrong key");
    assert!(matches!(err, LedgerError::Assembly { .. }));
}

// ============================================================================
// Phase 3: Upvotes
// ============================================================================

#[tokio::test]
async fn upvote_replaces_the_record() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let reviewer = funded_wallet(&ledger, &[10]).await;
    let voter = funded_wallet(&ledger, &[10, 10]).await;
    let original = submit_review(&client, &reviewer, "SKU-3003", 5).await;
    let before = client.reviews().await.expect("scan").into_reviews();

    let unsigned = client
        .upvote_by_ref(&voter.address(Network::Preprod), &original, voter.key_hash())
        .await
        .expect("build upvote");
    assert!(unsigned.required_signers().contains(&voter.key_hash()));
    sign_and_submit(&client, &voter, unsigned).await.expect("submit upvote");

    assert!(ledger.is_spent(&original).await);
    let after = client.reviews().await.expect("scan").into_reviews();
    assert_eq!(after.len(), 1);
    assert_ne!(after[0].out_ref, original);
    assert_eq!(after[0].datum.upvotes, 1);
    assert!(after[0].supersedes(&before[0]));
    assert_eq!(after[0].value, before[0].value);
}

#[tokio::test]
async fn losing_an_upvote_race_recovers_by_rebuilding() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let reviewer = funded_wallet(&ledger, &[10]).await;
    let alice = funded_wallet(&ledger, &[10, 10]).await;
    let bob = funded_wallet(&ledger, &[10, 10]).await;
    let original = submit_review(&client, &reviewer, "SKU-4004", 4).await;

    // Both voters build against the same live record.
    let from_alice = client
        .upvote_by_ref(&alice.address(Network::Preprod), &original, alice.key_hash())
        .await
        .expect("alice builds");
    let from_bob = client
        .upvote_by_ref(&bob.address(Network::Preprod), &original, bob.key_hash())
        .await
        .expect("bob builds");

    sign_and_submit(&client, &alice, from_alice).await.expect("alice wins");
    let err = sign_and_submit(&client, &bob, from_bob)
        .await
        .expect_err("bob loses");
    assert!(err.is_spent_conflict());

    // Bob re-queries and rebuilds against the new generation.
    let key = client.reviews().await.expect("scan").reviews()[0].key();
    let rebuilt = client
        .upvote_latest(&bob.address(Network::Preprod), &key, bob.key_hash())
        .await
        .expect("rebuild");
    sign_and_submit(&client, &bob, rebuilt).await.expect("bob retries");

    let reviews = client.reviews().await.expect("scan");
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews.reviews()[0].datum.upvotes, 2);
}

#[tokio::test]
async fn upvote_without_validator_is_unavailable() {
    let ledger = InMemoryLedger::new();
    let with_script = client_for(&ledger);
    let reviewer = funded_wallet(&ledger, &[10]).await;
    let original = submit_review(&with_script, &reviewer, "SKU-5005", 2).await;

    let config = LedgerConfig {
        script_address: Some(with_script.script_address().clone()),
        ..LedgerConfig::default()
    };
    let without_script = ReviewLedger::new(ledger.clone(), config, None).expect("client");
    let err = without_script
        .upvote_by_ref(&reviewer.address(Network::Preprod), &original, reviewer.key_hash())
        .await
        .expect_err("no validator");
    assert!(matches!(err, LedgerError::ScriptUnavailable { .. }));
}

// ============================================================================
// Phase 4: Indexing and Reputation
// ============================================================================

#[tokio::test]
async fn index_skips_foreign_records() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let reviewer = funded_wallet(&ledger, &[10]).await;
    submit_review(&client, &reviewer, "SKU-6006", 5).await;

    let mut foreign = Utxo::new(
        OutputRef::new(TxHash::new([0xee; 32]), 0),
        client.script_address().clone(),
        Lovelace::from_ada(2),
    );
    foreign.inline_datum = Some(vec![0xd8, 0x7a, 0x80]);
    ledger.insert_utxo(foreign).await;

    let index = client.reviews().await.expect("scan");
    assert_eq!(index.len(), 1);
    assert_eq!(index.skipped(), 1);
}

#[tokio::test]
async fn reputation_follows_upvotes_and_degrades_to_zero() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let reviewer = funded_wallet(&ledger, &[10, 10]).await;
    let voter = funded_wallet(&ledger, &[10, 10]).await;
    let first = submit_review(&client, &reviewer, "SKU-7007", 5).await;
    submit_review(&client, &reviewer, "SKU-7008", 4).await;
    assert_eq!(client.reputation(&reviewer.key_hash()).await, 0);

    let unsigned = client
        .upvote_by_ref(&voter.address(Network::Preprod), &first, voter.key_hash())
        .await
        .expect("build upvote");
    sign_and_submit(&client, &voter, unsigned).await.expect("submit upvote");
    assert_eq!(client.reputation(&reviewer.key_hash()).await, 10);
    assert_eq!(client.reputation(&voter.key_hash()).await, 0);

    ledger.set_unavailable(true).await;
    assert_eq!(client.reputation(&reviewer.key_hash()).await, 0);
    let err = client.reviews().await.expect_err("offline");
    assert!(matches!(err, LedgerError::ProviderUnavailable { .. }));
}

#[tokio::test]
async fn wallet_without_funds_cannot_build() {
    let ledger = InMemoryLedger::new();
    let client = client_for(&ledger);
    let broke = funded_wallet(&ledger, &[1]).await;
    let err = client
        .build_submission(
            &broke.address(Network::Preprod),
            broke.key_hash(),
            Digest32::new([1; 32]),
            5,
            Digest32::new([2; 32]),
        )
        .await
        .expect_err("insufficient");
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    ledger.set_unavailable(true).await;
    let err = client
        .build_submission(
            &broke.address(Network::Preprod),
            broke.key_hash(),
            Digest32::new([1; 32]),
            5,
            Digest32::new([2; 32]),
        )
        .await
        .expect_err("offline");
    assert!(matches!(err, LedgerError::Builder { .. }));
}

#[test]
fn balance_display_decoding() {
    // [5000000, {}]
    assert_eq!(decode_balance_hex("821a004c4b40a0"), Lovelace::new(5_000_000));
    assert_eq!(decode_balance_hex("ff"), Lovelace::new(0));
}
