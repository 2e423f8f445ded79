pub mod regions {
    pub const INSERT: &str = r#"
    INSERT INTO fetched_regions (
        level
      , x
      , y
      , width
      , height
      , saved_at
    ) VALUES (?, ?, ?, ?, ?, ?)
    "#;

    pub const SELECT_BY_LEVEL: &str = r#"
    SELECT id
         , level
         , x
         , y
         , width
         , height
         , saved_at
      FROM fetched_regions
     WHERE level = ?
     ORDER BY id
    "#;

    pub const DELETE_EXPIRED: &str = r#"
    DELETE FROM fetched_regions
     WHERE level = ?
       AND saved_at < ?
    "#;

    pub const DELETE_ALL: &str = "DELETE FROM fetched_regions";
}

pub mod users {
    pub const UPSERT: &str = r#"
    INSERT INTO users (id, name, profile_image)
    VALUES (?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name
      , profile_image = COALESCE(excluded.profile_image, users.profile_image)
    "#;
}

pub mod places {
    pub const UPSERT: &str = r#"
    INSERT INTO places (id, name, lng, lat)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        name = COALESCE(excluded.name, places.name)
    "#;
}

pub mod activities {
    pub const INSERT: &str = r#"
    INSERT INTO activities (
        id
      , place_id
      , user_id
      , lng
      , lat
      , x
      , y
      , created_at
      , checkins
      , reviews
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO NOTHING
    "#;

    /// Followed by `(?, ?, ...)`.
    pub const SELECT_IDS_IN: &str = "SELECT id FROM activities WHERE id IN";

    pub const SELECT_IN_RECT_SINCE: &str = r#"
    SELECT a.id
         , a.place_id
         , p.name
         , a.lng
         , a.lat
         , u.id
         , u.name
         , u.profile_image
         , a.created_at
         , a.checkins
         , a.reviews
      FROM activities AS a
      JOIN users AS u ON a.user_id = u.id
      JOIN places AS p ON a.place_id = p.id
     WHERE a.x BETWEEN ? AND ?
       AND a.y BETWEEN ? AND ?
       AND a.created_at >= ?
     ORDER BY a.created_at DESC, a.id
    "#;

    pub const COUNT: &str = "SELECT COUNT(*) FROM activities";

    pub const DELETE_ALL: &str = "DELETE FROM activities";
    pub const DELETE_ALL_PLACES: &str = "DELETE FROM places";
    pub const DELETE_ALL_USERS: &str = "DELETE FROM users";
}
