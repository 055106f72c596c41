/// End-to-end forwarding against a live engine with an in-memory sink.
#[cfg(test)]
mod pipeline {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use fop_core::athlete::Athlete;
    use fop_core::config::Config;
    use fop_core::engine::{Engine, EngineHandle};
    use fop_core::events::{FopEvent, FopEventKind, Origin};
    use fop_core::fop::{FieldOfPlay, FopSettings};
    use fop_core::group::Group;
    use fop_core::roster::MemoryRoster;
    use fop_core::types::Gender;
    use tokio::task::JoinHandle;

    use crate::forwarder::{Forwarder, ForwarderConfig};
    use crate::sink::Sink;
    use crate::snapshot::{Channel, Payload};
    use crate::Result;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Payload>>,
    }

    impl Recording {
        fn on(&self, channel: Channel) -> Vec<Payload> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.channel == channel)
                .cloned()
                .collect()
        }
    }

    impl Sink for Recording {
        async fn push(&self, payload: &Payload) -> Result<()> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn engine() -> (EngineHandle, JoinHandle<()>) {
        let mut a = Athlete::new(1, "Ana", "Lopez", Gender::F);
        a.start_number = Some(1);
        a.attempts[0].declaration = Some(70);
        let roster = Arc::new(MemoryRoster::new(vec![Group::new("W1", vec![a])]));
        Engine::spawn(FieldOfPlay::new("A", FopSettings::default(), roster), 64)
    }

    fn config() -> ForwarderConfig {
        let mut cfg = Config::default();
        cfg.competition.name = "Club Meet".into();
        cfg.remote.update_key = Some("k".into());
        ForwarderConfig::from_config(&cfg, "A")
    }

    async fn submit(handle: &EngineHandle, kind: FopEventKind) {
        handle
            .submit(FopEvent::new(Origin::new("announcer"), kind))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mirrors_current_athlete_and_clock() {
        let (handle, task) = engine();
        let sink = Arc::new(Recording::default());
        let forwarder = Forwarder::spawn(&handle, config(), sink.clone());

        submit(&handle, FopEventKind::SwitchGroup { group: Some("W1".into()) }).await;
        submit(&handle, FopEventKind::TimeStarted).await;

        handle.shutdown();
        task.await.unwrap();
        forwarder.join().await;

        let updates = sink.on(Channel::Update);
        let last = updates.last().expect("an update was sent");
        assert_eq!(last.get("fullName"), Some("LOPEZ Ana"));
        assert_eq!(last.get("weight"), Some("70"));
        assert_eq!(last.get("competitionName"), Some("Club Meet"));
        assert_eq!(last.get("updateKey"), Some("k"));

        let timers = sink.on(Channel::Timer);
        assert!(timers
            .iter()
            .any(|p| p.get("eventType") == Some("StartTime") && p.get("milliseconds") == Some("60000")));
    }

    #[tokio::test]
    async fn repeated_identical_state_is_sent_once() {
        let (handle, task) = engine();
        let sink = Arc::new(Recording::default());
        let cfg = ForwarderConfig {
            debounce: Duration::from_secs(60),
            ..config()
        };
        let forwarder = Forwarder::spawn(&handle, cfg, sink.clone());

        submit(&handle, FopEventKind::SwitchGroup { group: Some("W1".into()) }).await;
        let after_switch = sink_len_after_settle(&handle, &sink).await;
        submit(&handle, FopEventKind::SwitchGroup { group: Some("W1".into()) }).await;

        handle.shutdown();
        task.await.unwrap();
        forwarder.join().await;

        assert_eq!(sink.on(Channel::Update).len(), after_switch);
    }

    async fn sink_len_after_settle(handle: &EngineHandle, sink: &Arc<Recording>) -> usize {
        handle.status().await.unwrap();
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        sink.on(Channel::Update).len()
    }
}
