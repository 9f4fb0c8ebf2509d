use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::access::Owner;
use crate::pins::{NewPin, Pin, PinStatus, PinStore};

pub const V0_CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
pub const V1_CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// A distinct, valid v1 CID for each `n`
pub fn numbered_cid(n: u32) -> String {
    let suffix = format!("{:06}", n);
    format!("{}{}", &V1_CID[..V1_CID.len() - suffix.len()], suffix)
}

pub fn new_pin(cid: &str, owner: &Owner) -> NewPin {
    NewPin {
        cid: cid.to_string(),
        name: format!("pin-{}", &cid[cid.len().saturating_sub(6)..]),
        origins: Vec::new(),
        meta: BTreeMap::new(),
        owner: owner.clone(),
    }
}

/// Poll `check` until it yields a value or the wait times out
pub async fn wait_for<T, F, Fut>(mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if let Some(value) = check().await {
            return Some(value);
        }
        tokio::time::sleep(WAIT_INTERVAL).await;
    }
    None
}

/// Wait until the pin reaches `status`, returning it
pub async fn wait_for_status<S: PinStore>(store: &S, id: Uuid, status: PinStatus) -> Option<Pin> {
    wait_for(|| async move {
        store
            .get_by_id(id)
            .await
            .ok()
            .filter(|pin| pin.status == status)
    })
    .await
}
