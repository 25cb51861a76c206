//! What to deploy and how to wire it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    ArgValue, ConstructorArg, Felt,
    wiring::{UPDATE_ACCOUNT_CLASS_HASH, WiringStep},
};

/// Name of the Spherre factory contract.
pub const SPHERRE: &str = "Spherre";
/// Name of the multisig account contract Spherre deploys.
pub const SPHERRE_ACCOUNT: &str = "SpherreAccount";

/// Signatures required by the bootstrap account.
pub const BOOTSTRAP_THRESHOLD: u64 = 2;

/// A contract to deploy and its constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    pub constructor_args: Vec<ConstructorArg>,
}

/// Contracts deployed in order, then one wiring step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub contracts: Vec<ContractSpec>,
    pub wiring: WiringStep,
}

impl DeploymentPlan {
    /// Deploy Spherre and an initial SpherreAccount, then hand Spherre the
    /// account class hash so it can deploy accounts itself.
    ///
    /// The account gets three members (the deployer and two random addresses)
    /// and a threshold of two.
    pub fn spherre_bootstrap<R: Rng + ?Sized>(deployer: Felt, rng: &mut R) -> Self {
        let members = vec![deployer, Felt::random(rng), Felt::random(rng)];

        Self {
            contracts: vec![
                ContractSpec {
                    name: SPHERRE.to_string(),
                    constructor_args: vec![ConstructorArg::new("owner", deployer)],
                },
                ContractSpec {
                    name: SPHERRE_ACCOUNT.to_string(),
                    constructor_args: vec![
                        ConstructorArg::new("deployer", deployer),
                        ConstructorArg::new("owner", deployer),
                        ConstructorArg::new("name", "Initial account"),
                        ConstructorArg::new("description", "This is the initial account"),
                        ConstructorArg::new("members", members),
                        ConstructorArg::new("threshold", ArgValue::U64(BOOTSTRAP_THRESHOLD)),
                    ],
                },
            ],
            wiring: WiringStep::new(SPHERRE, SPHERRE_ACCOUNT, UPDATE_ACCOUNT_CLASS_HASH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_plan_shape() {
        let deployer = Felt::from_u64(0xd3);
        let plan = DeploymentPlan::spherre_bootstrap(deployer, &mut rand::rng());

        let names: Vec<_> = plan.contracts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![SPHERRE, SPHERRE_ACCOUNT]);
        assert_eq!(plan.wiring.dependent, SPHERRE);
        assert_eq!(plan.wiring.dependency, SPHERRE_ACCOUNT);

        let account = &plan.contracts[1];
        let members = account
            .constructor_args
            .iter()
            .find(|arg| arg.name == "members")
            .expect("members arg");
        match &members.value {
            ArgValue::Array(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], ArgValue::Felt(deployer));
            }
            other => panic!("members should be an array, got {other:?}"),
        }
    }
}
