//! Group membership and member-count reconciliation

mod support;

use social::{SocialError, models::NewGroup};
use support::World;
use uuid::Uuid;

fn new_group(name: &str, interests: &[&str]) -> NewGroup {
    NewGroup {
        name: name.to_string(),
        description: Some("  Weekly meetups  ".to_string()),
        category: "Academic".to_string(),
        interests: interests.iter().map(|i| i.to_string()).collect(),
        image_url: None,
    }
}

#[tokio::test]
async fn creator_is_member_and_admin_then_joiner_is_member() {
    let world = World::new();
    let owner = world.session("owner");
    let joiner = world.session("joiner");

    let group = world
        .groups
        .create(&owner, new_group("Rustaceans", &["Coding"]))
        .await
        .unwrap();
    assert_eq!(group.members, vec!["owner"]);
    assert_eq!(group.admins, vec!["owner"]);
    assert_eq!(group.member_count, 1);
    assert_eq!(group.description, "Weekly meetups");

    let group = world.groups.join(&joiner, group.id).await.unwrap();
    assert_eq!(group.member_count, 2);
    assert!(group.is_member("joiner"));
    assert!(!group.is_admin("joiner"));

    // Joining again changes nothing
    let group = world.groups.join(&joiner, group.id).await.unwrap();
    assert_eq!(group.member_count, 2);
    assert_eq!(group.members.len(), 2);
}

#[tokio::test]
async fn leaving_drops_membership_and_admin_rights() {
    let world = World::new();
    let owner = world.session("owner");
    let joiner = world.session("joiner");

    let group = world
        .groups
        .create(&owner, new_group("Chess Club", &["Chess"]))
        .await
        .unwrap();
    world.groups.join(&joiner, group.id).await.unwrap();

    let group = world.groups.leave(&owner, group.id).await.unwrap();
    assert_eq!(group.members, vec!["joiner"]);
    assert!(group.admins.is_empty());
    assert_eq!(group.member_count, 1);

    let group = world.groups.leave(&joiner, group.id).await.unwrap();
    assert_eq!(group.member_count, 0);
    let group = world.groups.leave(&joiner, group.id).await.unwrap();
    assert_eq!(group.member_count, 0);
}

#[tokio::test]
async fn missing_groups_fail_closed() {
    let world = World::new();
    let user = world.session("user");
    let missing = Uuid::new_v4();

    assert!(matches!(
        world.groups.join(&user, missing).await.unwrap_err(),
        SocialError::NotFound { .. }
    ));
    assert!(matches!(
        world.groups.leave(&user, missing).await.unwrap_err(),
        SocialError::NotFound { .. }
    ));
    assert!(matches!(
        world.groups.get(missing).await.unwrap_err(),
        SocialError::NotFound { .. }
    ));
    assert!(matches!(
        world.groups.reconcile(missing).await.unwrap_err(),
        SocialError::NotFound { .. }
    ));
}

#[tokio::test]
async fn creation_requires_name_category_and_interests() {
    let world = World::new();
    let owner = world.session("owner");

    let mut blank_name = new_group("  ", &["Coding"]);
    assert!(world.groups.create(&owner, blank_name.clone()).await.is_err());

    blank_name.name = "Coders".to_string();
    blank_name.category = String::new();
    assert!(world.groups.create(&owner, blank_name).await.is_err());

    let err = world
        .groups
        .create(&owner, new_group("Coders", &[" "]))
        .await
        .unwrap_err();
    assert!(matches!(err, SocialError::Invalid(_)));
}

#[tokio::test]
async fn my_groups_and_recommendations() {
    let world = World::new();
    let owner = world.session("owner");
    let reader = world.session("reader");

    let coding = world
        .groups
        .create(&owner, new_group("Coders", &["Coding", "AI/ML"]))
        .await
        .unwrap();
    let music = world
        .groups
        .create(&owner, new_group("Band", &["Music"]))
        .await
        .unwrap();
    let research = world
        .groups
        .create(&owner, new_group("Research Circle", &["Research", "AI/ML"]))
        .await
        .unwrap();
    world.groups.join(&reader, research.id).await.unwrap();

    let mine = world.groups.my_groups("reader").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, research.id);

    let interests = vec!["AI/ML".to_string()];
    let recommended = world.groups.recommended("reader", &interests).await.unwrap();
    assert_eq!(recommended.len(), 1);
    assert_eq!(recommended[0].id, coding.id);
    assert!(recommended.iter().all(|g| g.id != music.id));

    assert_eq!(world.groups.list().await.unwrap().len(), 3);
}

#[tokio::test]
async fn recommendations_are_capped() {
    let world = World::new();
    let owner = world.session("owner");

    for i in 0..35 {
        world
            .groups
            .create(&owner, new_group(&format!("Group {}", i), &["Chess"]))
            .await
            .unwrap();
    }

    let recommended = world
        .groups
        .recommended("reader", &["Chess".to_string()])
        .await
        .unwrap();
    assert_eq!(recommended.len(), social::groups::RECOMMENDED_LIMIT);
}

#[tokio::test]
async fn reconciliation_repairs_drifted_counts() {
    let world = World::new();
    let owner = world.session("owner");

    let drifted = world
        .groups
        .create(&owner, new_group("Drifted", &["Coding"]))
        .await
        .unwrap();
    let healthy = world
        .groups
        .create(&owner, new_group("Healthy", &["Coding"]))
        .await
        .unwrap();
    world.store.force_member_count(drifted.id, 7).await.unwrap();

    let repaired = world.groups.reconcile_all().await.unwrap();
    assert_eq!(repaired.len(), 1);
    assert_eq!(repaired[0].group_id, drifted.id);
    assert_eq!((repaired[0].before, repaired[0].after), (7, 1));

    assert_eq!(world.groups.get(drifted.id).await.unwrap().member_count, 1);
    let outcome = world.groups.reconcile(healthy.id).await.unwrap();
    assert!(!outcome.drifted());
}
