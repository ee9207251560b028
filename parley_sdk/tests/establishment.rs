//! Two sessions on the same messaging server: invitation, answer, candidate exchange and teardown.

#[cfg(test)]
mod tests {
    use parley_sdk::prelude::*;
    use parley_sdk::test_common::{TestNetwork, TestPeer};
    use rstest::rstest;
    use std::time::Duration;

    async fn logged_in(network: &TestNetwork, address: &str, auto_accept: bool) -> TestPeer {
        let peer = network.spawn_peer(address, auto_accept).unwrap();
        let _ = peer.login().await.unwrap();
        peer
    }

    fn candidates_from(network: &TestNetwork, from: &Address) -> Vec<String> {
        network
            .server
            .routed()
            .into_iter()
            .filter(|(_, message)| &message.from == from)
            .filter_map(|(_, message)| match message.body {
                MessageBody::ConnectivityCandidate(CandidatePayload::Last) => {
                    Some(CandidatePayload::LAST_MARKER.to_string())
                }
                MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(candidate)) => {
                    Some(candidate.candidate)
                }
                _ => None,
            })
            .collect()
    }

    #[rstest]
    #[case(json!(["audio"]), 1)]
    #[case(json!({ "audio": true, "video": true }), 2)]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn media_call_is_answered_automatically(#[case] demand: Value, #[case] tracks: usize) {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let mut bob = logged_in(&network, "bob@a.example", true).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], demand, None)
            .await
            .unwrap();

        let invitation = bob.wait_for_message(MessageType::Invitation).await;
        assert_eq!(invitation.conversation_id, id);
        assert_eq!(bob.session.conversation_ids(), vec![id]);

        let accepted = alice.wait_for_message(MessageType::Accepted).await;
        let MessageBody::Accepted(negotiation) = &accepted.body else {
            panic!("expected accepted, got {:?}", accepted.body);
        };
        assert_eq!(
            negotiation.session_description.as_ref().unwrap().sdp_type,
            SdpType::Answer
        );

        assert_eq!(
            alice.conversation_state(id).await,
            Some(ConversationState::Established)
        );
        assert_eq!(
            bob.conversation_state(id).await,
            Some(ConversationState::Established)
        );
        assert_eq!(alice.connection(id).tracks().len(), tracks);
        assert_eq!(bob.connection(id).tracks().len(), tracks);
        assert_eq!(
            bob.connection(id).remote().unwrap().sdp_type,
            SdpType::Offer
        );
        assert_eq!(
            alice.connection(id).remote().unwrap().sdp_type,
            SdpType::Answer
        );
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn caller_holds_candidates_until_accepted() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let mut bob = logged_in(&network, "bob@a.example", true).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();

        let mut seen = 0;
        bob.wait_for(|event| match event {
            KernelEvent::Message(message)
                if matches!(
                    message.body,
                    MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(_))
                ) =>
            {
                seen += 1;
                (seen == 3).then_some(())
            }
            _ => None,
        })
        .await;

        // the whole buffer is released after the last marker, most recent first
        assert_eq!(
            candidates_from(&network, &alice.address),
            vec![
                "last",
                "candidate:2 generation 0",
                "candidate:1 generation 0",
                "candidate:0 generation 0"
            ]
        );
        assert_eq!(
            bob.connection(id).added_candidates(),
            vec![
                "candidate:2 generation 0",
                "candidate:1 generation 0",
                "candidate:0 generation 0"
            ]
        );

        // the answerer's gate is already open when its candidates are gathered
        let mut seen = 0;
        alice
            .wait_for(|event| match event {
                KernelEvent::Message(message)
                    if matches!(
                        message.body,
                        MessageBody::ConnectivityCandidate(CandidatePayload::Candidate(_))
                    ) =>
                {
                    seen += 1;
                    (seen == 3).then_some(())
                }
                _ => None,
            })
            .await;
        assert_eq!(
            alice.connection(id).added_candidates(),
            vec![
                "candidate:0 generation 0",
                "candidate:1 generation 0",
                "candidate:2 generation 0"
            ]
        );

        let handle = alice.session.conversation(id).unwrap();
        assert!(handle.lock().await.buffered_candidates().is_empty());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn invitation_waits_for_a_decision(#[case] accept: bool) {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let mut bob = logged_in(&network, "bob@a.example", false).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();

        let invitation = bob.wait_for_message(MessageType::Invitation).await;
        assert_eq!(
            bob.conversation_state(id).await,
            Some(ConversationState::Deciding)
        );
        assert!(bob.connection(id).remote().is_none());

        let answered = bob.session.answer_request(&invitation, accept).await.unwrap();
        assert_eq!(answered, id);

        if accept {
            let _ = alice.wait_for_message(MessageType::Accepted).await;
            assert_eq!(
                alice.conversation_state(id).await,
                Some(ConversationState::Established)
            );
            assert_eq!(
                bob.conversation_state(id).await,
                Some(ConversationState::Established)
            );
        } else {
            let declined = alice.wait_for_message(MessageType::Declined).await;
            assert_eq!(declined.from, bob.address);
            assert_eq!(
                alice.conversation_state(id).await,
                Some(ConversationState::AwaitingAnswer)
            );
            assert!(bob.connection(id).remote().is_none());
        }
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn hangup_says_bye_and_tears_down_both_ends() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let mut bob = logged_in(&network, "bob@a.example", true).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        assert!(alice.session.hangup(Some(id)).await.unwrap());
        assert!(alice.session.conversation(id).is_none());
        assert!(alice.connection(id).is_closed());

        let bye = bob.wait_for_message(MessageType::Bye).await;
        assert_eq!(bye.conversation_id, id);
        assert!(bob.session.conversation(id).is_none());
        assert!(bob.connection(id).is_closed());

        // the shared login stub survives the conversation
        assert!(network.server.is_connected("wss://a.example", "alice@a.example"));
        assert!(matches!(
            alice.session.hangup(None).await,
            Err(SessionError::NoActiveSession(_))
        ));
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn second_call_reuses_the_open_conversation() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let bob = logged_in(&network, "bob@a.example", true).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        let again = alice
            .session
            .call(vec![bob.address.clone()], "video", None)
            .await
            .unwrap();
        assert_eq!(again, id);
        assert_eq!(alice.session.conversation_ids(), vec![id]);

        // video is new to bob, so the added resource is answered
        let _ = alice.wait_for_message(MessageType::Accepted).await;
        let kinds: Vec<MediaKind> = bob
            .connection(id)
            .tracks()
            .iter()
            .map(|track| track.kind)
            .collect();
        assert_eq!(kinds, vec![MediaKind::Audio, MediaKind::Video]);
        assert_eq!(bob.session.conversation_ids(), vec![id]);

        let handle = alice.session.conversation(id).unwrap();
        let conversation = handle.lock().await;
        let demand = conversation.my_participant().demand();
        assert!(demand.outgoing.audio.is_requested());
        assert!(demand.outgoing.video.is_requested());
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn reused_conversation_stays_one_to_one() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let bob = logged_in(&network, "bob@a.example", true).await;
        let carol = logged_in(&network, "carol@a.example", true).await;

        let id = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        assert!(matches!(
            alice
                .session
                .call(vec![carol.address.clone()], "audio", Some(id))
                .await,
            Err(SessionError::InvalidArgument(_))
        ));

        {
            let handle = alice.session.conversation(id).unwrap();
            let conversation = handle.lock().await;
            assert_eq!(conversation.remote_participants().len(), 1);
            assert_eq!(conversation.first_remote().unwrap().address(), &bob.address);
            assert_eq!(conversation.state(), ConversationState::Established);
        }

        let invitations = network
            .server
            .routed()
            .into_iter()
            .filter(|(_, message)| message.message_type() == Some(MessageType::Invitation))
            .count();
        assert_eq!(invitations, 1);
        assert!(carol.session.conversation_ids().is_empty());
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn presence_reaches_every_peer_and_logout_disconnects() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let mut alice = logged_in(&network, "alice@a.example", true).await;
        let mut bob = logged_in(&network, "bob@a.example", true).await;

        let _ = alice
            .session
            .call(vec![bob.address.clone()], "audio", None)
            .await
            .unwrap();
        let _ = alice.wait_for_message(MessageType::Accepted).await;

        assert_eq!(alice.session.send_presence("away").await.unwrap(), 1);
        let presence = bob.wait_for_message(MessageType::Presence).await;
        assert_eq!(
            presence.body,
            MessageBody::Presence {
                status: "away".to_string()
            }
        );

        alice.session.logout().await.unwrap();
        assert!(alice.session.identity().is_none());
        assert!(alice.session.conversation_ids().is_empty());
        assert!(!network.server.is_connected("wss://a.example", "alice@a.example"));
        let _ = bob.wait_for_message(MessageType::Bye).await;
    }

    #[rstest]
    #[timeout(Duration::from_secs(10))]
    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_calls_are_rejected() {
        parley_logging::setup_log();
        let network = TestNetwork::new();
        let alice = network.spawn_peer("alice@a.example", true).unwrap();
        let bob: Address = "bob@a.example".into();

        assert!(matches!(
            alice.session.call(vec![bob.clone()], "audio", None).await,
            Err(SessionError::NoActiveSession(_))
        ));

        let _ = alice.login().await.unwrap();
        assert!(matches!(
            alice.session.call(Vec::new(), "audio", None).await,
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            alice
                .session
                .call(vec![bob.clone(), "carol@a.example".into()], "audio", None)
                .await,
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            alice.session.call(vec![bob.clone()], "nothing", None).await,
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            alice.session.call(vec![bob], "audio", None).await,
            Err(SessionError::ResolutionError { .. })
        ));
        assert!(alice.session.conversation_ids().is_empty());
    }
}
