//! Conditional decryption attacks over indexed encodings.
//!
//! The attacker collects keys from two families with disjoint attribute
//! sets and asks whether some combination decrypts a ciphertext that
//! neither family satisfies alone. Key material is instantiated for a
//! growing number of keys per family until the size of the single-key
//! monomial basis bounds the search.

use tracing::debug;

use crate::attack::AttackMessages;
use crate::decompose::{decompose_encoding, merge_lists};
use crate::decryption::DecryptionAttack;
use crate::encodings::{
    create_b_encoding, create_ciphertext_encoding, create_key_encoding,
    generate_unknown_variable_set,
};
use crate::expr::Expr;
use crate::solver::unknown_symbols;

pub struct ConditionalDecryptionAttack {
    messages: AttackMessages,
    masterkey: Expr,
    special_s: Expr,
    benc: Vec<Expr>,
    kenc_fixed: Vec<Expr>,
    kenc_att: Vec<Expr>,
    cenc_fixed: Vec<Expr>,
    cenc_att: Vec<Expr>,
    unknown: Vec<Expr>,
    prefixes: Vec<String>,
    nr_indexed_encodings: u32,
    sol: Vec<String>,
}

impl ConditionalDecryptionAttack {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        masterkey: Expr,
        special_s: Expr,
        benc: Vec<Expr>,
        kenc_fixed: Vec<Expr>,
        kenc_att: Vec<Expr>,
        cenc_fixed: Vec<Expr>,
        cenc_att: Vec<Expr>,
        unknown: Vec<Expr>,
        prefixes: Vec<String>,
        nr_indexed_encodings: u32,
    ) -> Self {
        ConditionalDecryptionAttack {
            messages: AttackMessages::conditional(),
            masterkey,
            special_s,
            benc,
            kenc_fixed,
            kenc_att,
            cenc_fixed,
            cenc_att,
            unknown,
            prefixes,
            nr_indexed_encodings,
            sol: Vec::new(),
        }
    }

    pub fn set_messages(&mut self, messages: AttackMessages) {
        self.messages = messages;
    }

    fn try_all_conditional_decryption_attacks(&mut self) -> Vec<String> {
        let att_range_key_1 = [1u32];
        let att_range_key_2 = [2u32];
        let att_range_ct = [1u32, 2];

        let benc = create_b_encoding(&[], &self.benc, &[1, 2]);
        let cenc = create_ciphertext_encoding(
            &self.cenc_fixed,
            &self.cenc_att,
            &self.special_s,
            &att_range_ct,
            &self.prefixes,
            self.nr_indexed_encodings,
        );

        let kenc_init = create_key_encoding(
            &self.kenc_fixed,
            &self.kenc_att,
            &att_range_key_1,
            &self.prefixes,
            self.nr_indexed_encodings,
            &[1],
        );
        let generated = generate_unknown_variable_set(&kenc_init, &cenc, &benc);
        self.unknown = merge_lists(&self.unknown, &generated);

        let (_, uvector_k) = decompose_encoding(&kenc_init, &unknown_symbols(&self.unknown));
        let max_nr_of_keys = uvector_k.len();
        debug!(max_nr_of_keys, "bounding the conditional key search");

        let mut msgs = Vec::new();
        let mut first_attack = true;

        for nr_of_keys in 1..max_nr_of_keys {
            let key_indices_1: Vec<u32> = (1..=nr_of_keys as u32).collect();
            let key_indices_2: Vec<u32> =
                key_indices_1.iter().map(|i| i + nr_of_keys as u32).collect();

            let mut kenc = create_key_encoding(
                &self.kenc_fixed,
                &self.kenc_att,
                &att_range_key_1,
                &self.prefixes,
                self.nr_indexed_encodings,
                &key_indices_1,
            );
            kenc.extend(create_key_encoding(
                &self.kenc_fixed,
                &self.kenc_att,
                &att_range_key_2,
                &self.prefixes,
                self.nr_indexed_encodings,
                &key_indices_2,
            ));

            let generated = generate_unknown_variable_set(&kenc, &cenc, &benc);
            self.unknown = merge_lists(&self.unknown, &generated);

            let mut attack = DecryptionAttack::new(
                &self.masterkey * &self.special_s,
                kenc,
                cenc.clone(),
                benc.clone(),
                vec![],
                self.unknown.clone(),
            );
            attack.set_messages(self.messages.clone());
            attack.run();

            if first_attack {
                msgs.push(attack.show_solution());
                first_attack = false;
            }
        }
        msgs
    }

    pub fn run(&mut self) {
        let msgs = self.try_all_conditional_decryption_attacks();
        self.sol = if msgs.is_empty() {
            vec![self.messages.not_found.clone()]
        } else {
            msgs
        };
    }

    /// The collected result messages, first key-count attack first.
    pub fn show_solution(&self) -> &[String] {
        &self.sol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::{get_indexed_encoding, ATT_MPK_GROUP, POLICY_SHARE};
    use crate::expr::parse_expr;

    fn e(s: &str) -> Expr {
        parse_expr(s).unwrap()
    }

    #[test]
    fn test_jlww13_conditional_attack() {
        let k_fixed = vec![e("alpha + r")];
        let k_att = vec![
            &e("r") + &(&get_indexed_encoding("rp", 1) * &e(ATT_MPK_GROUP)),
            get_indexed_encoding("rp", 1),
        ];
        let c_att = vec![&e(POLICY_SHARE) * &e(ATT_MPK_GROUP), e(POLICY_SHARE)];

        let mut attack = ConditionalDecryptionAttack::new(
            e("alpha"),
            e("s"),
            vec![],
            k_fixed,
            k_att,
            vec![],
            c_att,
            vec![e("alpha"), e("r"), e("s")],
            vec!["rp".to_string()],
            1,
        );
        attack.run();
        let sol = attack.show_solution();
        assert_eq!(
            sol[0].trim(),
            "[*] Conditional decryption attack found: 1*k0*c1 + 1*k0*c3 + -1*k1*c1 + 1*k2*c0 + -1*k5*c3 + 1*k6*c2"
        );
    }
}
