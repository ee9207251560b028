//! Data channel negotiation and codec selection between two sessions.

#[cfg(test)]
mod tests {
    use parley_sdk::prelude::*;
    use parley_sdk::test_common::{ChatCodec, TestNetwork, TestPeer};
    use rstest::rstest;
    use std::time::Duration;

    async fn logged_in(peer: TestPeer) -> TestPeer {
        let _ = peer.login().await.unwrap();
        peer
    }

    async fn opened(peer: &mut TestPeer, conversation_id: Uuid) -> (String, Address) {
        peer.wait_for(|event| match event {
            KernelEvent::DataChannel(id, DataChannelEvent::Opened { label, peer: remote })
                if id == conversation_id =>
            {
                Some((label, remote))
            }
            _ => None,
        })
        .await
    }

    async fn received(peer: &mut TestPeer, conversation_id: Uuid) -> (PayloadType, Value, Address) {
        peer.wait_for(|event| match event {
            KernelEvent::DataChannel(
                id,
                DataChannelEvent::Message {
                    payload_type,
                    payload,
                    from,
                    ..
                },
            ) if id == conversation_id => Some((payload_type, payload, from)),
            _ => None,
        })
        .await
    }

    fn candidate_of(message: &Message) -> Option<&str> {
        match &message.body {
            MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(candidate)) => {
                Some(candidate.candidate.as_str())
            }
            _ => None,
        }
    }

    async fn candidates_of_generation(peer: &mut TestPeer, generation: usize, count: usize) {
        let suffix = format!("generation {generation}");
        let mut seen = 0;
        peer.wait_for(|event| match event {
            KernelEvent::Message(message)
                if candidate_of(&message).is_some_and(|candidate| candidate.ends_with(&suffix)) =>
            {
                seen += 1;
                (seen == count).then_some(())
            }
            _ => None,
        })
        .await
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn advertised_codec_is_used_both_ways() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let mut bob = logged_in(network.spawn_peer("bob@a.example", true).unwrap()).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], json!({ "data": "chat" }), None)
            .await
            .unwrap();

        let (_, remote) = opened(&mut alice, id).await;
        assert_eq!(remote, bob.address);
        let (bob_label, remote) = opened(&mut bob, id).await;
        assert_eq!(remote, alice.address);

        let invitation = network
            .server
            .routed()
            .into_iter()
            .map(|(_, message)| message)
            .find(|message| message.message_type() == Some(MessageType::Invitation))
            .unwrap();
        let MessageBody::Invitation(negotiation) = &invitation.body else {
            unreachable!()
        };
        assert!(!negotiation.demand.wants_media());
        assert_eq!(negotiation.demand.outgoing.data.payload_type(), Some("chat"));

        let _ = alice.wait_for_message(MessageType::Accepted).await;
        assert!(alice
            .session
            .send_data(json!({ "text": "hi" }), PayloadType::from(PayloadType::CHAT), Some(id), None)
            .await
            .unwrap());

        let channel = alice.connection(id).channels().remove(0);
        let frame = channel.sent().remove(0);
        assert_eq!(ChatCodec.decode(&frame).unwrap(), json!({ "text": "hi" }));

        bob.connection(id).receive_frame(&bob_label, frame).unwrap();
        let (payload_type, payload, from) = received(&mut bob, id).await;
        assert_eq!(payload_type, PayloadType::from(PayloadType::CHAT));
        assert_eq!(payload, json!({ "text": "hi" }));
        assert_eq!(from, alice.address);
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn unadvertised_payload_type_falls_back_to_plain() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let carol = network
            .spawn_peer_with_codecs("carol@a.example", true, &[])
            .unwrap();
        let mut carol = logged_in(carol).await;

        let id = alice
            .session
            .call(vec![carol.address.clone()], json!({ "data": "file" }), None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        {
            let handle = alice.session.conversation(id).unwrap();
            let conversation = handle.lock().await;
            assert!(conversation.data_handler().unwrap().payload_type().is_plain());
        }

        assert!(alice
            .session
            .send_data(json!("x"), PayloadType::from(PayloadType::FILE), Some(id), None)
            .await
            .unwrap());
        let frame = alice.connection(id).channels().remove(0).sent().remove(0);
        assert_eq!(frame.as_ref(), br#""x""#);

        let (carol_label, _) = opened(&mut carol, id).await;
        carol.connection(id).receive_frame(&carol_label, frame).unwrap();
        let (payload_type, payload, _) = received(&mut carol, id).await;
        assert!(payload_type.is_plain());
        assert_eq!(payload, json!("x"));
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn channel_opened_by_the_peer_joins_the_handler() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let mut bob = logged_in(network.spawn_peer("bob@a.example", true).unwrap()).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], json!({ "data": "chat" }), None)
            .await
            .unwrap();
        let _ = opened(&mut bob, id).await;

        let remote = bob.connection(id).open_remote_channel("from-alice").unwrap();
        let (label, _) = opened(&mut bob, id).await;
        assert_eq!(label, "from-alice");

        let frame = ChatCodec.encode(&json!(42)).unwrap();
        bob.connection(id).receive_frame(remote.label(), frame).unwrap();
        let (payload_type, payload, _) = received(&mut bob, id).await;
        assert_eq!(payload_type, PayloadType::from(PayloadType::CHAT));
        assert_eq!(payload, json!(42));

        remote.close().await.unwrap();
        let closed = bob
            .wait_for(|event| match event {
                KernelEvent::DataChannel(cid, DataChannelEvent::Closed { label }) if cid == id => {
                    Some(label)
                }
                _ => None,
            })
            .await;
        assert_eq!(closed, "from-alice");
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn invitation_for_media_and_data_is_answered_once() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let mut bob = logged_in(network.spawn_peer("bob@a.example", true).unwrap()).await;

        let id = Uuid::new_v4();
        let invitation = Message::invitation(
            alice.address.clone(),
            bob.address.clone(),
            id,
            Demand::normalize("all"),
            SessionDescription::offer(format!("v=0 offer {id}")),
        );
        network
            .server
            .inject("wss://a.example", "bob@a.example", invitation)
            .unwrap();

        let (_, remote) = opened(&mut bob, id).await;
        assert_eq!(remote, alice.address);
        let accepted = alice.wait_for_message(MessageType::Accepted).await;
        assert_eq!(accepted.conversation_id, id);

        let connection = bob.connection(id);
        assert_eq!(connection.tracks().len(), 2);
        assert_eq!(connection.channels().len(), 1);
        assert_eq!(connection.remote().unwrap().sdp_type, SdpType::Offer);

        let answers = network
            .server
            .routed()
            .into_iter()
            .filter(|(_, message)| {
                message.from == bob.address && message.message_type() == Some(MessageType::Accepted)
            })
            .count();
        assert_eq!(answers, 1);

        let handle = bob.session.conversation(id).unwrap();
        let conversation = handle.lock().await;
        assert!(conversation.data_handler().unwrap().payload_type().is_plain());
        assert_eq!(conversation.state(), ConversationState::Established);
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn data_channel_joins_an_established_call() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let mut bob = logged_in(network.spawn_peer("bob@a.example", true).unwrap()).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        let again = alice
            .session
            .call(vec![bob.address.clone()], json!({ "data": "chat" }), None)
            .await
            .unwrap();
        assert_eq!(again, id);

        let (_, remote) = opened(&mut bob, id).await;
        assert_eq!(remote, alice.address);
        let _ = alice.wait_for_message(MessageType::Accepted).await;
        candidates_of_generation(&mut alice, 1, 3).await;
        candidates_of_generation(&mut bob, 1, 3).await;

        // one media negotiation, then a data-only answer
        assert_eq!(bob.connection(id).tracks().len(), 1);
        assert_eq!(bob.connection(id).channels().len(), 1);
        {
            let handle = bob.session.conversation(id).unwrap();
            let conversation = handle.lock().await;
            let handler = conversation.data_handler().unwrap();
            assert_eq!(handler.payload_type(), &PayloadType::from(PayloadType::CHAT));
        }

        let routed: Vec<Message> = network
            .server
            .routed()
            .into_iter()
            .map(|(_, message)| message)
            .collect();
        let answers: Vec<usize> = routed
            .iter()
            .enumerate()
            .filter(|(_, message)| {
                message.from == bob.address && message.message_type() == Some(MessageType::Accepted)
            })
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(answers.len(), 2);

        // both gates were closed again for the data channel and only reopened by its answer
        let second_round = |from: &Address| -> Vec<usize> {
            routed
                .iter()
                .enumerate()
                .filter(|(_, message)| &message.from == from)
                .filter(|(_, message)| {
                    candidate_of(message).is_some_and(|candidate| candidate.ends_with("generation 1"))
                })
                .map(|(idx, _)| idx)
                .collect()
        };
        let alice_round = second_round(&alice.address);
        let bob_round = second_round(&bob.address);
        assert_eq!(alice_round.len(), 3);
        assert_eq!(bob_round.len(), 3);
        assert!(alice_round.iter().all(|idx| *idx > answers[1]));
        assert!(bob_round.iter().all(|idx| *idx > answers[1]));

        let handle = alice.session.conversation(id).unwrap();
        let conversation = handle.lock().await;
        assert!(conversation.ice());
        assert!(conversation.buffered_candidates().is_empty());
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn send_data_needs_a_channel() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(network.spawn_peer("alice@a.example", true).unwrap()).await;
        let bob = logged_in(network.spawn_peer("bob@a.example", true).unwrap()).await;

        assert!(matches!(
            alice.session.send_data(json!(1), PayloadType::plain(), None, None).await,
            Err(SessionError::NoActiveSession(_))
        ));

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;
        assert!(matches!(
            alice.session.send_data(json!(1), PayloadType::plain(), Some(id), None).await,
            Err(SessionError::NoActiveSession(_))
        ));
    }
}
