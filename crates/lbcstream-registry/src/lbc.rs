//! The embedded Liquidity Bridge Contract event catalogue.

use std::fmt;
use std::str::FromStr;

use lbcstream_core::error::RegistryError;

use crate::registry::EventRegistry;

/// CSDL source for every event the bridge contract emits.
pub const LBC_CSDL: &str = include_str!("../schemas/lbc.csdl");

/// Build a registry holding the full bridge catalogue.
///
/// Every embedded fingerprint is re-verified against its signature.
pub fn lbc_registry() -> Result<EventRegistry, RegistryError> {
    let mut builder = EventRegistry::builder();
    builder.load_csdl(LBC_CSDL)?;
    Ok(builder.build())
}

macro_rules! lbc_kinds {
    ($($variant:ident),+ $(,)?) => {
        /// Event kinds emitted by the bridge contract.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum LbcEventKind {
            $($variant),+
        }

        impl LbcEventKind {
            pub const ALL: &'static [LbcEventKind] = &[$(LbcEventKind::$variant),+];

            /// Registry key of this kind.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(LbcEventKind::$variant => stringify!($variant)),+
                }
            }
        }

        impl FromStr for LbcEventKind {
            type Err = RegistryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(LbcEventKind::$variant),)+
                    _ => Err(RegistryError::UnknownEventKind { kind: s.to_string() }),
                }
            }
        }
    };
}

lbc_kinds!(
    BalanceDecrease,
    BalanceIncrease,
    BridgeCapExceeded,
    CallForUser,
    CollateralIncrease,
    DaoFeeSent,
    Initialized,
    OwnershipTransferred,
    PegInRegistered,
    PegOutDeposit,
    PegOutRefunded,
    PegOutUserRefunded,
    PegoutCollateralIncrease,
    PegoutWithdrawCollateral,
    Penalized,
    Refund,
    Register,
    Resigned,
    WithdrawCollateral,
    Withdrawal,
);

impl fmt::Display for LbcEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LbcEventKind> for String {
    fn from(kind: LbcEventKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_loads_and_verifies() {
        let reg = lbc_registry().unwrap();
        assert_eq!(reg.len(), 20);
        assert_eq!(reg.len(), LbcEventKind::ALL.len());
    }

    #[test]
    fn every_kind_is_registered() {
        let reg = lbc_registry().unwrap();
        for kind in LbcEventKind::ALL {
            let d = reg.lookup(kind.as_str()).unwrap();
            assert_eq!(d.kind, kind.to_string());
        }
    }

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!("PegOutDeposit".parse::<LbcEventKind>().unwrap(), LbcEventKind::PegOutDeposit);
        assert!("PegoutDeposit".parse::<LbcEventKind>().is_err());
    }

    #[test]
    fn register_layout() {
        let reg = lbc_registry().unwrap();
        let d = reg.lookup("Register").unwrap();
        assert_eq!(d.signature(), "Register(uint256,address,uint256)");
        assert_eq!(d.indexed_fields().len(), 1);
        assert_eq!(d.topic_position("from"), Some(1));
    }

    #[test]
    fn call_for_user_layout() {
        let reg = lbc_registry().unwrap();
        let d = reg.lookup("CallForUser").unwrap();
        assert_eq!(
            d.signature(),
            "CallForUser(address,address,uint256,uint256,bytes,bool,bytes32)"
        );
        assert_eq!(d.data_fields().len(), 5);
    }

    #[test]
    fn pegout_deposit_by_fingerprint() {
        let reg = lbc_registry().unwrap();
        let d = reg
            .by_fingerprint("0xb1bc7bfc0dab19777eb03aa0a5643378fc9f186c8fc5a36620d21136fbea570f")
            .unwrap();
        assert_eq!(d.kind, "PegOutDeposit");
    }
}
