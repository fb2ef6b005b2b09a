//! Account session driving the transfer, deposit and ragequit pipelines.
//!
//! Steps run strictly in order and only the confirmation step writes to the
//! store. Abandoning a prepared or proven transfer leaves no trace.

use rand_core::OsRng;
use tracing::{debug, info, warn};

use shadepool_core::{
    wormhole_nullifier, Address, Fr, Hash32, Recipient, TransferKind, WormholeNote,
};
use shadepool_state::TreeKind;

use crate::builder::{build_transfer, BuildParams, TransferRequest, TreeView, UnsignedTransfer};
use crate::capabilities::{Capabilities, Proof};
use crate::circuit::{CircuitInputs, PublicInputs, RagequitInputs, RagequitPublicInputs};
use crate::entries::{record_entry, sync_entries, SyncReport, WormholeDeposit};
use crate::error::WalletError;
use crate::message::Eip712Domain;
use crate::receipt::Receipt;
use crate::selection::{select_inputs, Selection, SelectionRequest};
use crate::signer::{PublicKey, RecoverableSignature};
use crate::store::{
    BalanceSummary, ConfirmationBatch, EntryStatus, NoteStatus, NoteStore, ShieldedNoteRecord,
    WormholeEntryRecord,
};

/// Chain binding of a session.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Chain every record is scoped to.
    pub chain_id: u64,
    /// Signing domain; its chain id must match `chain_id`.
    pub domain: Eip712Domain,
}

/// A signed transfer with its circuit witness.
#[derive(Clone, Debug)]
pub struct PreparedTransfer {
    /// Inputs chosen from the store.
    pub selection: Selection,
    /// Witness and message.
    pub unsigned: UnsignedTransfer,
    /// Owner signature over the digest.
    pub signature: RecoverableSignature,
    /// Key recovered from the signature.
    pub public_key: PublicKey,
    /// JSON witness for the prover.
    pub circuit_inputs: CircuitInputs,
}

impl PreparedTransfer {
    /// Public inputs the proof will expose.
    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs::from_transfer(&self.unsigned)
    }

    /// Secret behind the pseudo-nullifier when no entry is consumed. Not
    /// persisted; keep it if the transfer may need to be linked later.
    pub fn pseudo_secret(&self) -> Option<Fr> {
        self.unsigned.pseudo_secret()
    }
}

/// A prepared transfer with its proof.
#[derive(Clone, Debug)]
pub struct ProvenTransfer {
    /// Signed transfer.
    pub prepared: PreparedTransfer,
    /// Proof over its witness.
    pub proof: Proof,
}

/// Result of a confirmed transfer.
#[derive(Clone, Debug)]
pub struct ConfirmedTransfer {
    /// Mined transaction.
    pub tx_hash: Hash32,
    /// Notes now spendable by this account.
    pub new_notes: Vec<ShieldedNoteRecord>,
    /// Openings of notes created for other accounts, for delivery.
    pub outgoing: Vec<ShieldedNoteRecord>,
}

/// Ragequit witness awaiting a proof.
#[derive(Clone, Debug)]
pub struct PreparedRagequit {
    /// Entry being ragequitted.
    pub entry_id: u64,
    /// Circuit witness.
    pub inputs: RagequitInputs,
    /// Public inputs the proof will expose.
    pub public_inputs: RagequitPublicInputs,
}

/// Transfer and bridge session for one account.
pub struct ShieldedPool {
    config: PoolConfig,
    store: NoteStore,
    caps: Capabilities,
}

impl ShieldedPool {
    /// Bind a store to its signer. Fails if the signer does not own the
    /// store or the domain names another chain.
    pub fn new(config: PoolConfig, store: NoteStore, caps: Capabilities) -> Result<Self, WalletError> {
        if caps.signer.address() != store.account() {
            return Err(WalletError::InvalidRequest(format!(
                "signer {} does not own store {}",
                caps.signer.address(),
                store.account()
            )));
        }
        if config.domain.chain_id != config.chain_id {
            return Err(WalletError::InvalidRequest(
                "signing domain is bound to a different chain".into(),
            ));
        }
        Ok(Self {
            config,
            store,
            caps,
        })
    }

    /// Account this session acts for.
    pub fn account(&self) -> Address {
        self.store.account()
    }

    /// Backing note store.
    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    /// Spendable and pending totals for one asset.
    pub fn balance(&self, token: Address, token_id: u128) -> Result<BalanceSummary, WalletError> {
        self.store.balance(self.config.chain_id, token, token_id)
    }

    // ---- transfers ----

    /// Select inputs, rebuild trees, build the witness and have it signed.
    pub async fn prepare_transfer(
        &mut self,
        request: TransferRequest,
    ) -> Result<PreparedTransfer, WalletError> {
        let account = self.account();
        let selection = select_inputs(
            &SelectionRequest {
                chain_id: self.config.chain_id,
                account,
                token: request.token,
                token_id: request.token_id,
                amount: request.amount,
            },
            &self.store.notes()?,
            &self.store.entries()?,
        )?;
        info!(
            amount = %request.amount,
            notes = selection.notes.len(),
            bridged = selection.entry.is_some(),
            "selected inputs"
        );

        let shielded_id = selection.shielded_tree_id().unwrap_or(0);
        let wormhole_id = selection.wormhole_tree_id().unwrap_or(0);
        let shielded = self.tree_view(TreeKind::Shielded, shielded_id).await?;
        let wormhole = self.tree_view(TreeKind::Wormhole, wormhole_id).await?;

        let unsigned = build_transfer(
            BuildParams {
                chain_id: self.config.chain_id,
                owner: account,
                domain: &self.config.domain,
                request: &request,
                selection: &selection,
                shielded: &shielded,
                wormhole: &wormhole,
            },
            &mut OsRng,
        )?;

        let signature = self
            .caps
            .signer
            .sign(unsigned.digest)
            .await?;
        let public_key = self
            .caps
            .signer
            .recover_public_key(&unsigned.digest, &signature)?;
        if public_key.address() != account {
            return Err(WalletError::Key(format!(
                "signature recovers to {}, expected {account}",
                public_key.address()
            )));
        }
        let circuit_inputs = CircuitInputs::assemble(&unsigned, &public_key, &signature);
        info!(digest = %unsigned.digest, "transfer signed");

        Ok(PreparedTransfer {
            selection,
            unsigned,
            signature,
            public_key,
            circuit_inputs,
        })
    }

    /// Prove a signed transfer.
    pub async fn prove(&self, prepared: PreparedTransfer) -> Result<ProvenTransfer, WalletError> {
        let proof = self.caps.prover.prove(&prepared.circuit_inputs).await?;
        let expected = prepared.public_inputs().to_fields();
        if proof.public_inputs != expected {
            return Err(WalletError::capability(
                "prover",
                "proof commits to different public inputs",
            ));
        }
        if !self.caps.prover.verify(&proof).await? {
            return Err(WalletError::capability("prover", "proof does not verify"));
        }
        info!(bytes = proof.proof.len(), "transfer proven");
        Ok(ProvenTransfer { prepared, proof })
    }

    /// Hand a proven transfer to the relayer.
    pub async fn submit(&self, proven: &ProvenTransfer) -> Result<Hash32, WalletError> {
        let tx_hash = self
            .caps
            .relayer
            .submit(&proven.prepared.unsigned.message, &proven.proof)
            .await?;
        info!(tx = %tx_hash, "transfer submitted");
        Ok(tx_hash)
    }

    /// Wait for the receipt and persist the outcome. Nothing is written unless
    /// the receipt succeeded and carries this transfer's event.
    pub async fn confirm(
        &mut self,
        proven: &ProvenTransfer,
        tx_hash: Hash32,
    ) -> Result<ConfirmedTransfer, WalletError> {
        let receipt = self.caps.relayer.await_receipt(tx_hash).await?;
        let tx = &proven.prepared.unsigned;
        let log = match receipt.shielded_transfer(&tx.nullifiers()) {
            Ok(log) => log,
            Err(err) => {
                warn!(tx = %tx_hash, error = %err, "transfer not confirmed");
                return Err(err);
            }
        };
        if log.commitments.as_slice() != tx.commitments.as_slice() {
            warn!(tx = %tx_hash, "receipt commitments differ from the signed transfer");
            return Err(WalletError::ReceiptDecodeFailure {
                tx_hash,
                event: "ShieldedTransfer",
            });
        }

        let mut new_notes = Vec::new();
        let mut outgoing = Vec::new();
        for (position, output) in tx.outputs.iter().enumerate() {
            if output.kind == TransferKind::Withdrawal || output.amount.is_zero() {
                continue;
            }
            let Recipient::Address(owner) = output.recipient else {
                continue;
            };
            let record = ShieldedNoteRecord {
                chain_id: self.config.chain_id,
                tree_id: log.tree_id,
                leaf_index: log.start_index + position as u64,
                owner,
                token: tx.token,
                token_id: tx.token_id,
                blinding: output.blinding,
                amount: output.amount,
                commitment: log.commitments[position],
                status: NoteStatus::Available,
                created_in: tx_hash,
                used_in: None,
            };
            if record.expected_commitment() != record.commitment {
                return Err(WalletError::ReceiptDecodeFailure {
                    tx_hash,
                    event: "ShieldedTransfer",
                });
            }
            if owner == self.account() {
                new_notes.push(record);
            } else {
                outgoing.push(record);
            }
        }

        self.store.apply_confirmation(&ConfirmationBatch {
            tx_hash,
            spent_notes: tx.spent_notes(),
            consumed_entry: tx.consumed_entry().map(|id| id.to_string()),
            new_notes: new_notes.clone(),
        })?;
        info!(
            tx = %tx_hash,
            created = new_notes.len(),
            outgoing = outgoing.len(),
            "transfer confirmed"
        );
        Ok(ConfirmedTransfer {
            tx_hash,
            new_notes,
            outgoing,
        })
    }

    /// Full pipeline: prepare, prove, submit, confirm.
    pub async fn transfer(
        &mut self,
        request: TransferRequest,
    ) -> Result<ConfirmedTransfer, WalletError> {
        let prepared = self.prepare_transfer(request).await?;
        let proven = self.prove(prepared).await?;
        let tx_hash = self.submit(&proven).await?;
        self.confirm(&proven, tx_hash).await
    }

    async fn tree_view(&self, kind: TreeKind, tree_id: u64) -> Result<TreeView, WalletError> {
        let snapshot = self.caps.indexer.tree(kind, tree_id).await?;
        debug!(?kind, tree_id, leaves = snapshot.as_ref().map(|s| s.size), "fetched tree");
        match TreeView::load(kind, tree_id, snapshot.as_ref()) {
            Ok(view) => Ok(view),
            Err(err) => {
                warn!(?kind, tree_id, error = %err, "tree desync");
                Err(err)
            }
        }
    }

    // ---- bridge deposits ----

    /// Fresh secret and burn address for a deposit to `recipient` (this
    /// account when `None`).
    pub fn prepare_wormhole_deposit(&self, recipient: Option<Address>) -> WormholeDeposit {
        WormholeDeposit::generate(recipient.unwrap_or_else(|| self.account()), &mut OsRng)
    }

    /// Record the entry created by funding `deposit.burn_address`.
    pub fn record_wormhole_entry(
        &self,
        receipt: &Receipt,
        deposit: &WormholeDeposit,
    ) -> Result<WormholeEntryRecord, WalletError> {
        record_entry(&self.store, self.config.chain_id, receipt, deposit)
    }

    /// Pull screening results for every tracked entry.
    pub async fn sync_wormhole_entries(&mut self) -> Result<SyncReport, WalletError> {
        sync_entries(&self.store, self.caps.indexer.as_ref(), self.config.chain_id).await
    }

    // ---- ragequit ----

    /// Build the ragequit witness for a screened entry this account deposited.
    pub async fn prepare_ragequit(&self, entry_id: u64) -> Result<PreparedRagequit, WalletError> {
        let entry = self
            .store
            .get_entry(entry_id)?
            .ok_or_else(|| WalletError::MissingRecord {
                table: "wormhole_note",
                id: entry_id.to_string(),
            })?;
        let approved = match entry.status {
            EntryStatus::Approved => true,
            EntryStatus::Rejected => false,
            other => {
                return Err(WalletError::InvalidRequest(format!(
                    "entry {entry_id} is {} and cannot be ragequitted",
                    other.as_str()
                )))
            }
        };
        if entry.used_in.is_some() {
            return Err(WalletError::InvalidRequest(format!(
                "entry {entry_id} was already spent"
            )));
        }
        let position = entry.position.ok_or_else(|| {
            WalletError::InvalidRequest(format!("entry {entry_id} has no tree position"))
        })?;
        let tree = self.tree_view(TreeKind::Wormhole, position.tree_id).await?;
        let commitment = entry.expected_commitment(approved);
        let proof = tree.prove(position.leaf_index, commitment)?;
        let note: WormholeNote = entry.note();
        let inputs = RagequitInputs::new(
            tree.root(),
            &note,
            proof.index,
            proof.padded_siblings(),
            approved,
        );
        let public_inputs = RagequitPublicInputs {
            wormhole_root: tree.root(),
            wormhole_commitment: commitment,
            wormhole_nullifier: wormhole_nullifier(&note),
            wormhole_sender: note.sender.to_field(),
        };
        info!(entry = entry_id, approved, "ragequit prepared");
        Ok(PreparedRagequit {
            entry_id,
            inputs,
            public_inputs,
        })
    }

    /// Prove, submit and confirm a ragequit.
    pub async fn ragequit(&mut self, entry_id: u64) -> Result<WormholeEntryRecord, WalletError> {
        let prepared = self.prepare_ragequit(entry_id).await?;
        let proof = self
            .caps
            .ragequit_prover
            .prove_ragequit(&prepared.inputs)
            .await?;
        if proof.public_inputs != prepared.public_inputs.to_fields() {
            return Err(WalletError::capability(
                "ragequit prover",
                "proof commits to different public inputs",
            ));
        }
        let tx_hash = self.caps.relayer.submit_ragequit(entry_id, &proof).await?;
        let receipt = self.caps.relayer.await_receipt(tx_hash).await?;
        self.confirm_ragequit(&receipt, entry_id)
    }

    /// Mark an entry reclaimed once its `Ragequit` event is seen.
    pub fn confirm_ragequit(
        &self,
        receipt: &Receipt,
        entry_id: u64,
    ) -> Result<WormholeEntryRecord, WalletError> {
        receipt.ragequit(entry_id)?;
        let current = self
            .store
            .get_entry(entry_id)?
            .ok_or_else(|| WalletError::MissingRecord {
                table: "wormhole_note",
                id: entry_id.to_string(),
            })?;
        let next = match current.status {
            EntryStatus::Rejected => EntryStatus::Completed,
            _ => EntryStatus::Ragequitted,
        };
        if !current.status.can_become(next) {
            return Err(WalletError::InvalidTransition {
                table: "wormhole_note",
                id: entry_id.to_string(),
                from: current.status.as_str(),
                to: next.as_str(),
            });
        }
        let mut record = current;
        record.status = next;
        record.used_in = Some(receipt.tx_hash);
        self.store.update_entry(&record)?;
        info!(entry = entry_id, tx = %receipt.tx_hash, "ragequit confirmed");
        Ok(record)
    }
}
