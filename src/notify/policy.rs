/// Who gets told about which lifecycle event
use super::{Notification, NotificationKind};
use crate::did::record::DidDocumentRecord;

/// A notification bound to its recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub notification: Notification,
}

/// Creation with recipients: each recipient hears from the creator
pub fn on_created(record: &DidDocumentRecord, recipients: &[String], sender_id: &str) -> Vec<Delivery> {
    recipients
        .iter()
        .map(|recipient| Delivery {
            recipient: recipient.clone(),
            notification: Notification {
                title: "New DID request".to_string(),
                body: format!("A new DID has been created: {}", record.did),
                kind: NotificationKind::DidCreated,
                did: record.did.clone(),
                sender_id: Some(sender_id.to_string()),
                notification_id: record.id.to_string(),
                reason: None,
            },
        })
        .collect()
}

/// Approval: the creator is told
pub fn on_approved(record: &DidDocumentRecord) -> Vec<Delivery> {
    to_creator(record, |creator| Delivery {
        recipient: creator.to_string(),
        notification: Notification {
            title: "DID approved".to_string(),
            body: format!("Your DID {} has been approved", record.did),
            kind: NotificationKind::DidApproved,
            did: record.did.clone(),
            sender_id: None,
            notification_id: record.id.to_string(),
            reason: None,
        },
    })
}

/// Rejection: the creator is told, with the reason
pub fn on_rejected(record: &DidDocumentRecord, reason: &str) -> Vec<Delivery> {
    to_creator(record, |creator| {
        let body = if reason.is_empty() {
            format!("Your DID {} has been rejected", record.did)
        } else {
            format!("Your DID {} has been rejected: {}", record.did, reason)
        };

        Delivery {
            recipient: creator.to_string(),
            notification: Notification {
                title: "DID rejected".to_string(),
                body,
                kind: NotificationKind::DidRejected,
                did: record.did.clone(),
                sender_id: None,
                notification_id: record.id.to_string(),
                reason: Some(reason.to_string()).filter(|r| !r.is_empty()),
            },
        }
    })
}

fn to_creator(record: &DidDocumentRecord, build: impl FnOnce(&str) -> Delivery) -> Vec<Delivery> {
    record
        .metadata
        .created_by
        .as_deref()
        .filter(|creator| !creator.is_empty())
        .map(build)
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::record::fixtures::record;

    const ALICE: &str = "did:web:example.com:alice";

    #[test]
    fn test_created_goes_to_each_recipient() {
        let rec = record(ALICE);
        let recipients = vec!["device-2".to_string(), "device-3".to_string()];
        let out = on_created(&rec, &recipients, "device-1");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipient, "device-2");
        assert_eq!(out[1].recipient, "device-3");
        for d in &out {
            assert_eq!(d.notification.kind, NotificationKind::DidCreated);
            assert_eq!(d.notification.sender_id.as_deref(), Some("device-1"));
            assert_eq!(d.notification.notification_id, rec.id.to_string());
            assert_eq!(d.notification.did, ALICE);
        }
        assert!(on_created(&rec, &[], "device-1").is_empty());
    }

    #[test]
    fn test_moderation_goes_to_creator() {
        let rec = record(ALICE);
        let approved = on_approved(&rec);
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].recipient, "device-1");
        assert_eq!(approved[0].notification.kind, NotificationKind::DidApproved);

        let rejected = on_rejected(&rec, "duplicate");
        assert_eq!(rejected[0].notification.reason.as_deref(), Some("duplicate"));
        assert!(rejected[0].notification.body.ends_with(": duplicate"));
    }

    #[test]
    fn test_no_creator_no_notification() {
        let mut rec = record(ALICE);
        rec.metadata.created_by = None;
        assert!(on_approved(&rec).is_empty());
        assert!(on_rejected(&rec, "spam").is_empty());
    }
}
