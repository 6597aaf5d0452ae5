mod common;

use anyhow::Result;
use common::{Club, at, on, test_services};
use lessonledger::application::{AppError, HistoryFilter};

#[tokio::test]
async fn test_history_orders_by_timestamp_descending() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let club = Club::create(&services).await?;

    // Recorded out of chronological order on purpose
    services
        .ledger
        .apply_delta_at(club.alice.id, 10, "march", None, on("2024-03-01"))
        .await?;
    services
        .ledger
        .apply_delta_at(club.alice.id, 10, "january", None, on("2024-01-01"))
        .await?;
    services
        .ledger
        .apply_delta_at(club.alice.id, -1, "february", Some(club.chen.id), on("2024-02-01"))
        .await?;

    let history = services.query.list_history().await?;
    let notes: Vec<&str> = history.iter().map(|h| h.entry.note.as_str()).collect();
    assert_eq!(notes, vec!["march", "february", "january"]);
    Ok(())
}

#[tokio::test]
async fn test_history_ties_broken_by_id_descending() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let club = Club::create(&services).await?;

    let same_second = at("2024-06-01 17:00:00");
    let mut ids = Vec::new();
    for note in ["first", "second", "third"] {
        let result = services
            .ledger
            .apply_delta_at(club.bob.id, 1, note, None, same_second)
            .await?;
        ids.push(result.entry.id);
    }

    let history = services.query.list_history().await?;
    let history_ids: Vec<i64> = history.iter().map(|h| h.entry.id).collect();
    ids.reverse();
    assert_eq!(history_ids, ids);
    assert_eq!(history[0].entry.note, "third");
    Ok(())
}

#[tokio::test]
async fn test_history_joins_names() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let club = Club::create(&services).await?;

    services
        .ledger
        .apply_delta_at(club.alice.id, 10, "topup", None, at("2024-01-01 09:00:00"))
        .await?;
    services
        .ledger
        .apply_delta_at(
            club.alice.id,
            -1,
            "class",
            Some(club.dana.id),
            at("2024-01-02 09:00:00"),
        )
        .await?;

    let history = services.query.list_history().await?;
    assert_eq!(history.len(), 2);

    assert_eq!(history[0].student_name, "Alice");
    assert_eq!(history[0].coach_name.as_deref(), Some("Coach Dana"));
    assert_eq!(history[0].entry.delta, -1);

    // Top-ups have no coach
    assert_eq!(history[1].student_name, "Alice");
    assert_eq!(history[1].coach_name, None);
    assert_eq!(history[1].entry.delta, 10);
    Ok(())
}

#[tokio::test]
async fn test_student_history_filters_by_student() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let club = Club::create(&services).await?;

    services.ledger.top_up(club.alice.id, 10).await?;
    services.ledger.top_up(club.bob.id, 5).await?;
    services
        .ledger
        .consume_class(club.bob.id, club.chen.id, "")
        .await?;

    let bob_history = services.query.student_history(club.bob.id).await?;
    assert_eq!(bob_history.len(), 2);
    assert!(bob_history.iter().all(|h| h.entry.student_id == club.bob.id));

    let alice_history = services.query.student_history(club.alice.id).await?;
    assert_eq!(alice_history.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_student_history_unknown_student() -> Result<()> {
    let (services, _temp) = test_services().await?;

    let result = services.query.student_history(42).await;
    assert!(matches!(result, Err(AppError::StudentNotFound(42))));
    Ok(())
}

#[tokio::test]
async fn test_history_limit() -> Result<()> {
    let (services, _temp) = test_services().await?;
    let club = Club::create(&services).await?;

    for day in 1..=5 {
        services
            .ledger
            .apply_delta_at(
                club.alice.id,
                1,
                &format!("day {}", day),
                None,
                on(&format!("2024-04-0{}", day)),
            )
            .await?;
    }

    let history = services
        .query
        .list_history_filtered(HistoryFilter {
            student_id: None,
            limit: Some(2),
        })
        .await?;

    let notes: Vec<&str> = history.iter().map(|h| h.entry.note.as_str()).collect();
    assert_eq!(notes, vec!["day 5", "day 4"]);
    Ok(())
}

#[tokio::test]
async fn test_lists_keep_registration_order() -> Result<()> {
    let (services, _temp) = test_services().await?;

    for name in ["Zoe", "Adam", "Mia"] {
        services.ledger.register_student(name, None).await?;
        services.ledger.register_coach(name, None).await?;
    }

    let students: Vec<String> = services
        .query
        .list_students()
        .await?
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(students, vec!["Zoe", "Adam", "Mia"]);

    let coaches: Vec<String> = services
        .query
        .list_coaches()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(coaches, vec!["Zoe", "Adam", "Mia"]);
    Ok(())
}

#[tokio::test]
async fn test_get_coach_not_found() -> Result<()> {
    let (services, _temp) = test_services().await?;

    let result = services.query.get_coach(7).await;
    assert!(matches!(result, Err(AppError::CoachNotFound(7))));
    Ok(())
}
