//! Presence features for trees (classifier input) and dialogue acts (classifier targets).

use std::collections::HashMap;

use crate::dialogue_act::DialogueAct;
use crate::tree::Tree;

/// Sparse feature map: feature name → value. Absent keys are zero.
pub type FeatureMap = HashMap<String, f32>;

/// One feature per distinct (t-lemma, formeme) pair found in the tree.
pub fn tree_features(tree: &Tree) -> FeatureMap {
    tree.nodes()
        .iter()
        .map(|n| (format!("t_lemma_formeme:{}+{}", n.t_lemma, n.formeme), 1.0))
        .collect()
}

/// One feature per act type (`dat:`) and per slot-value pair (`svp:`) in the act.
///
/// Slots without a value (e.g. `request(area)`) give `svp:area`; items without a slot
/// only contribute their act type. The empty act has no features.
pub fn da_features(da: &DialogueAct) -> FeatureMap {
    let mut feats = FeatureMap::new();
    for item in da.items() {
        feats.insert(format!("dat:{}", item.da_type), 1.0);
        match (&item.slot, &item.value) {
            (Some(slot), Some(value)) => {
                feats.insert(format!("svp:{}={}", slot, value), 1.0);
            }
            (Some(slot), None) => {
                feats.insert(format!("svp:{}", slot), 1.0);
            }
            _ => {}
        }
    }
    feats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_features() {
        let tree = Tree::from_pairs(&[("food", "n:attr"), ("food", "n:attr"), ("be", "v:fin")]);
        let feats = tree_features(&tree);
        assert_eq!(feats.len(), 2);
        assert_eq!(feats.get("t_lemma_formeme:food+n:attr"), Some(&1.0));
    }

    #[test]
    fn test_da_features() {
        let da: DialogueAct = "inform(food=Thai,price=cheap)&request(area)&bye()".parse().unwrap();
        let mut keys: Vec<_> = da_features(&da).into_keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["dat:bye", "dat:inform", "dat:request", "svp:area", "svp:food=Thai", "svp:price=cheap"]
        );
    }

    #[test]
    fn test_empty_da_has_no_features() {
        assert!(da_features(&DialogueAct::default()).is_empty());
    }
}
