use cpg_common::Amount;
use crypto_payment_engine::{Attachment, Notifier, NotifierError, PriceConversionError, PriceConverter};
use mockall::mock;

mock! {
    pub Notifier {}
    impl Notifier for Notifier {
        async fn send(&self, chat_id: i64, text: &str, attachments: &[Attachment]) -> Result<i64, NotifierError>;
        async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), NotifierError>;
    }
}

mock! {
    pub PriceConverter {}
    impl PriceConverter for PriceConverter {
        async fn convert(&self, amount: Amount, from: &str, to: &str) -> Result<Amount, PriceConversionError>;
    }
}

/// A notifier that accepts any message and any retraction.
pub fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send().returning(|_, _, _| Ok(1));
    notifier.expect_delete().returning(|_, _| Ok(()));
    notifier
}

/// A notifier that fails the test if anything is sent or retracted.
pub fn silent_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send().never();
    notifier.expect_delete().never();
    notifier
}
