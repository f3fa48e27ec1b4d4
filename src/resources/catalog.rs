//! The demo resources: field shapes, generators and patch rules.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::{json, Value};

use super::controller::{num_value, number, truthy, Counter, ListMerge, ResourceSpec};
use crate::store::Record;

pub static PERFORMERS: ResourceSpec = ResourceSpec {
    name: "performers",
    singular: "Performer",
    required: &["name", "specialty", "country"],
    generate: random_performer,
    build: build_performer,
    counters: &[
        Counter { field: "teamSize", min: 1.0 },
        Counter { field: "experienceYears", min: 0.0 },
    ],
    list: "awards",
    list_merge: ListMerge::Union,
    patch_note: "teamSize and experienceYears changed relatively, awards were merged",
    after_patch: Some(flag_awarded),
};

pub static ARTISTS: ResourceSpec = ResourceSpec {
    name: "artists",
    singular: "Artist",
    required: &["name", "country", "genre"],
    generate: random_artist,
    build: build_artist,
    counters: &[Counter { field: "memberCount", min: 0.0 }],
    list: "albums",
    list_merge: ListMerge::Append,
    patch_note: "memberCount changed relatively, albums were appended",
    after_patch: None,
};

pub static HOTELS: ResourceSpec = ResourceSpec {
    name: "hotels",
    singular: "Hotel",
    required: &["name", "country", "city"],
    generate: random_hotel,
    build: build_hotel,
    counters: &[Counter { field: "roomCount", min: 0.0 }],
    list: "amenities",
    list_merge: ListMerge::Union,
    patch_note: "roomCount changed relatively, amenities were merged",
    after_patch: None,
};

pub static BRANDS: ResourceSpec = ResourceSpec {
    name: "brands",
    singular: "Brand",
    required: &["name", "country"],
    generate: random_brand,
    build: build_brand,
    counters: &[Counter { field: "productCount", min: 0.0 }],
    list: "certifications",
    list_merge: ListMerge::Union,
    patch_note: "productCount changed relatively, certifications were merged",
    after_patch: None,
};

pub static SHOWS: ResourceSpec = ResourceSpec {
    name: "shows",
    singular: "Show",
    required: &["title", "showDate", "duration", "price"],
    generate: random_show,
    build: build_show,
    counters: &[Counter { field: "availableSeats", min: 0.0 }],
    list: "categories",
    list_merge: ListMerge::Union,
    patch_note: "availableSeats changed relatively, categories were merged, isSoldOut auto-updated",
    after_patch: Some(flag_sold_out),
};

pub static CONCERTS: ResourceSpec = ResourceSpec {
    name: "concerts",
    singular: "Concert",
    required: &["title", "venue", "date", "price"],
    generate: random_concert,
    build: build_concert,
    counters: &[Counter { field: "availableTickets", min: 0.0 }],
    list: "genres",
    list_merge: ListMerge::Union,
    patch_note: "availableTickets changed relatively, genres were merged",
    after_patch: None,
};

pub static TOURS: ResourceSpec = ResourceSpec {
    name: "tours",
    singular: "Tour",
    required: &["title", "destination", "departureDate", "returnDate", "price"],
    generate: random_tour,
    build: build_tour,
    counters: &[Counter { field: "availableSeats", min: 0.0 }],
    list: "includedServices",
    list_merge: ListMerge::Union,
    patch_note: "availableSeats changed relatively, services were merged",
    after_patch: Some(flag_overbooked),
};

pub static PRODUCTS: ResourceSpec = ResourceSpec {
    name: "products",
    singular: "Product",
    required: &["name", "category", "price"],
    generate: random_product,
    build: build_product,
    counters: &[Counter { field: "stock", min: 0.0 }],
    list: "ingredients",
    list_merge: ListMerge::Union,
    patch_note: "stock changed relatively, ingredients were merged, availability auto-updated",
    after_patch: Some(flag_in_stock),
};

/// Every resource served by the demo application, in mount order.
pub static ALL: [&ResourceSpec; 8] = [
    &CONCERTS,
    &ARTISTS,
    &TOURS,
    &HOTELS,
    &PRODUCTS,
    &BRANDS,
    &SHOWS,
    &PERFORMERS,
];

// Body field helpers. Missing or malformed values fall back to defaults.

fn raw(body: &Record, field: &str) -> Value {
    body.get(field).cloned().unwrap_or(Value::Null)
}

fn text(body: &Record, field: &str) -> Value {
    let value = body.get(field);
    if truthy(value) {
        raw(body, field)
    } else {
        Value::from("")
    }
}

fn number_or(body: &Record, field: &str, default: f64) -> Value {
    let n = number(body.get(field));
    num_value(if n == 0.0 { default } else { n })
}

fn flag(body: &Record, field: &str, default: bool) -> Value {
    match body.get(field) {
        None => Value::Bool(default),
        value => Value::Bool(truthy(value)),
    }
}

fn list(body: &Record, field: &str) -> Value {
    match body.get(field) {
        Some(Value::Array(items)) => Value::Array(items.clone()),
        _ => json!([]),
    }
}

fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// A reference id from the body, or null.
fn reference(body: &Record, field: &str) -> Value {
    if truthy(body.get(field)) {
        raw(body, field)
    } else {
        Value::Null
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// (year, month, day) of a day count since the Unix epoch.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    // Civil-from-days over 400-year eras.
    let days = days + 719_468;
    let era = days.div_euclid(146_097);
    let doe = days - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Calendar year of the current UTC date.
fn current_year() -> i64 {
    civil_from_days(now_secs().div_euclid(86_400)).0
}

/// UTC timestamp `days` from now, as `YYYY-MM-DDTHH:MM:SS.000Z`.
fn iso_in_days(days: i64) -> String {
    let secs = now_secs() + days * 86_400;
    let (year, month, day) = civil_from_days(secs.div_euclid(86_400));
    let time = secs.rem_euclid(86_400);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.000Z",
        time / 3600,
        time % 3600 / 60,
        time % 60
    )
}

// Random data helpers.

fn pick(rng: &mut dyn RngCore, options: &[&'static str]) -> &'static str {
    options.choose(rng).copied().unwrap_or_default()
}

fn sample(rng: &mut dyn RngCore, options: &[&'static str], count: usize) -> Vec<&'static str> {
    options.choose_multiple(rng, count).copied().collect()
}

fn rating(rng: &mut dyn RngCore) -> Value {
    let r: f64 = rng.gen_range(3.5..5.0);
    num_value((r * 10.0).round() / 10.0)
}

fn random_performer(rng: &mut dyn RngCore) -> Record {
    let name = pick(rng, &["Ivan the Brave", "Maria the Graceful", "Peter the Merry", "Elena the Flying", "Dmitry the Strong", "Olga the Flexible"]);
    let specialty = pick(rng, &["Acrobat", "Juggler", "Clown", "Illusionist", "Aerialist", "Animal Trainer", "Equilibrist"]);
    let country = pick(rng, &["Russia", "France", "Italy", "China", "USA", "Germany"]);
    let award_count = rng.gen_range(1..=4);
    let awards = sample(
        rng,
        &["Golden Clown", "Master of Circus Arts", "Audience Award", "Act of the Year", "Silver Lion", "Festival Grand Prix"],
        award_count,
    );

    into_record(json!({
        "name": format!("{name} {}", rng.gen_range(0..100)),
        "specialty": specialty,
        "country": country,
        "experienceYears": rng.gen_range(3..28),
        "isActive": rng.gen_bool(0.9),
        "hasInternationalAwards": rng.gen_bool(0.6),
        "awards": awards,
        "teamSize": rng.gen_range(1..=10),
        "salary": rng.gen_range(100_000..500_000),
        "rating": rating(rng),
        "biography": format!("Talented {} from {country}", specialty.to_lowercase()),
    }))
}

fn build_performer(body: &Record) -> Record {
    into_record(json!({
        "name": raw(body, "name"),
        "specialty": raw(body, "specialty"),
        "country": raw(body, "country"),
        "experienceYears": number_or(body, "experienceYears", 0.0),
        "isActive": flag(body, "isActive", true),
        "hasInternationalAwards": flag(body, "hasInternationalAwards", false),
        "awards": list(body, "awards"),
        "teamSize": number_or(body, "teamSize", 1.0),
        "salary": number_or(body, "salary", 0.0),
        "rating": number_or(body, "rating", 0.0),
        "biography": text(body, "biography"),
    }))
}

/// Any awards after a patch mean the performer is internationally awarded.
fn flag_awarded(_existing: &Record, _body: &Record, updates: &mut Record) {
    let awarded = matches!(updates.get("awards"), Some(Value::Array(awards)) if !awards.is_empty());
    if awarded {
        updates.insert("hasInternationalAwards".to_string(), Value::Bool(true));
    }
}

fn random_artist(rng: &mut dyn RngCore) -> Record {
    let name = pick(rng, &["The Rockers", "Jazz Masters", "Pop Stars", "Electronic Wizards", "Classical Ensemble"]);
    let country = pick(rng, &["USA", "UK", "Germany", "France", "Russia"]);
    let genre = pick(rng, &["Rock", "Jazz", "Pop", "Electronic", "Classical"]);
    let prefixes = ["Greatest Hits", "Live at", "The Best of", "Legacy", "Collection"];
    let album_count = rng.gen_range(1..=5);
    let albums: Vec<String> = (1..=album_count)
        .map(|i| format!("{} {i}", pick(rng, &prefixes)))
        .collect();

    into_record(json!({
        "name": format!("{name} {}", rng.gen_range(0..100)),
        "country": country,
        "genre": genre,
        "foundedYear": rng.gen_range(1960..2024),
        "isActive": rng.gen_bool(0.8),
        "memberCount": rng.gen_range(1..=10),
        "albums": albums,
        "biography": format!("Famous {genre} artist from {country}"),
    }))
}

fn build_artist(body: &Record) -> Record {
    into_record(json!({
        "name": raw(body, "name"),
        "country": raw(body, "country"),
        "genre": raw(body, "genre"),
        "foundedYear": number_or(body, "foundedYear", current_year() as f64),
        "isActive": flag(body, "isActive", true),
        "memberCount": number_or(body, "memberCount", 1.0),
        "albums": list(body, "albums"),
        "biography": text(body, "biography"),
    }))
}

fn random_hotel(rng: &mut dyn RngCore) -> Record {
    const PLACES: [(&str, &str); 6] = [
        ("Russia", "Moscow"),
        ("Turkey", "Antalya"),
        ("Greece", "Athens"),
        ("Spain", "Barcelona"),
        ("Italy", "Rome"),
        ("France", "Paris"),
    ];
    const AMENITIES: [&[&str]; 4] = [
        &["Pool", "Restaurant", "WiFi"],
        &["Spa", "Gym", "Bar", "Parking"],
        &["Conference Hall", "Restaurant", "Pool", "WiFi"],
        &["Beach", "Pool", "Spa", "Restaurant", "Bar"],
    ];

    let name = pick(rng, &["Grand Palace", "Sea Breeze", "Mountain View", "City Lights", "Royal Garden", "Sunset Resort"]);
    let (country, city) = PLACES.choose(rng).copied().unwrap_or(PLACES[0]);
    let amenities = AMENITIES.choose(rng).copied().unwrap_or_default();

    into_record(json!({
        "name": format!("{name} {}", rng.gen_range(0..100)),
        "country": country,
        "city": city,
        "address": format!("Street {}", rng.gen_range(1..=200)),
        "stars": rng.gen_range(3..=5),
        "hasPool": rng.gen_bool(0.7),
        "hasWifi": rng.gen_bool(0.9),
        "roomCount": rng.gen_range(50..350),
        "amenities": amenities,
        "pricePerNight": rng.gen_range(3_000..18_000),
        "rating": rating(rng),
        "description": format!("Comfortable hotel in {city}"),
    }))
}

fn build_hotel(body: &Record) -> Record {
    into_record(json!({
        "name": raw(body, "name"),
        "country": raw(body, "country"),
        "city": raw(body, "city"),
        "address": text(body, "address"),
        "stars": number_or(body, "stars", 3.0),
        "hasPool": flag(body, "hasPool", false),
        "hasWifi": flag(body, "hasWifi", true),
        "roomCount": number_or(body, "roomCount", 0.0),
        "amenities": list(body, "amenities"),
        "pricePerNight": number_or(body, "pricePerNight", 0.0),
        "rating": number_or(body, "rating", 0.0),
        "description": text(body, "description"),
    }))
}

fn random_brand(rng: &mut dyn RngCore) -> Record {
    let name = pick(rng, &["Natura Bloom", "Pure Glow", "Velvet Skin", "Aqua Fresh", "Silk Touch", "Green Leaf"]);
    let country = pick(rng, &["France", "South Korea", "USA", "Japan", "Italy", "Germany"]);
    let cert_count = rng.gen_range(2..=4);
    let certifications = sample(
        rng,
        &["Ecocert", "COSMOS Organic", "Leaping Bunny", "Vegan Society", "NATRUE", "ISO 22716"],
        cert_count,
    );
    let website = format!("https://{}.com", name.to_lowercase().replace(' ', ""));

    into_record(json!({
        "name": format!("{name} {}", rng.gen_range(0..100)),
        "country": country,
        "foundedYear": rng.gen_range(1950..2024),
        "isOrganic": rng.gen_bool(0.5),
        "hasCrueltyFree": rng.gen_bool(0.7),
        "certifications": certifications,
        "productCount": rng.gen_range(10..210),
        "website": website,
        "rating": rating(rng),
        "description": format!("Quality cosmetics from {name}"),
    }))
}

fn build_brand(body: &Record) -> Record {
    into_record(json!({
        "name": raw(body, "name"),
        "country": raw(body, "country"),
        "foundedYear": number_or(body, "foundedYear", current_year() as f64),
        "isOrganic": flag(body, "isOrganic", false),
        "hasCrueltyFree": flag(body, "hasCrueltyFree", true),
        "certifications": list(body, "certifications"),
        "productCount": number_or(body, "productCount", 0.0),
        "website": text(body, "website"),
        "rating": number_or(body, "rating", 0.0),
        "description": text(body, "description"),
    }))
}

fn random_show(rng: &mut dyn RngCore) -> Record {
    const CATEGORIES: [&[&str]; 6] = [
        &["Acrobatics", "Gymnastics"],
        &["Juggling", "Equilibristics"],
        &["Clowning", "Pantomime"],
        &["Animal Training", "Animals"],
        &["Illusions", "Magic"],
        &["Aerial Gymnastics", "Trapeze"],
    ];

    let title = pick(rng, &["Circus of Wonders", "Magic Show", "High-Flying Acrobats", "Jugglers' Evening", "Trained Animals", "Comedy Performance", "Aerial Acrobats"]);
    let categories = CATEGORIES.choose(rng).copied().unwrap_or_default();
    let duration = [60, 75, 90, 100, 120][rng.gen_range(0..5)];
    let age_restriction = [0, 3, 6, 10, 12][rng.gen_range(0..5)];

    into_record(json!({
        "title": format!("{title} {}", rng.gen_range(0..100)),
        "performerId": rng.gen_range(1..=10),
        "showDate": iso_in_days(rng.gen_range(30..210)),
        "duration": duration,
        "price": rng.gen_range(800..2_800),
        "availableSeats": rng.gen_range(50..550),
        "isSoldOut": rng.gen_bool(0.2),
        "categories": categories,
        "ageRestriction": age_restriction,
        "hasAnimals": rng.gen_bool(0.4),
        "rating": rating(rng),
        "description": format!("Unforgettable circus performance: {}", title.to_lowercase()),
    }))
}

fn build_show(body: &Record) -> Record {
    into_record(json!({
        "title": raw(body, "title"),
        "performerId": reference(body, "performerId"),
        "showDate": raw(body, "showDate"),
        "duration": number_or(body, "duration", 0.0),
        "price": number_or(body, "price", 0.0),
        "availableSeats": number_or(body, "availableSeats", 0.0),
        "isSoldOut": flag(body, "isSoldOut", false),
        "categories": list(body, "categories"),
        "ageRestriction": number_or(body, "ageRestriction", 0.0),
        "hasAnimals": flag(body, "hasAnimals", false),
        "rating": number_or(body, "rating", 0.0),
        "description": text(body, "description"),
    }))
}

/// No seats left means sold out; seats coming back from zero reopen sales.
fn flag_sold_out(existing: &Record, _body: &Record, updates: &mut Record) {
    let Some(seats) = updates.get("availableSeats").map(|v| number(Some(v))) else {
        return;
    };
    if seats == 0.0 {
        updates.insert("isSoldOut".to_string(), Value::Bool(true));
    } else if number(existing.get("availableSeats")) == 0.0 {
        updates.insert("isSoldOut".to_string(), Value::Bool(false));
    }
}

fn random_concert(rng: &mut dyn RngCore) -> Record {
    const GENRES: [&[&str]; 5] = [
        &["Rock", "Alternative"],
        &["Pop", "Dance"],
        &["Jazz", "Soul"],
        &["Electronic", "House"],
        &["Classical", "Opera"],
    ];

    let title = pick(rng, &["Summer Music Fest", "Night of the Stars", "Urban Beats", "Classical Evening", "Pop Extravaganza"]);
    let venue = pick(rng, &["Olympic Stadium", "Arena Hall", "Concert Palace", "Open Air Theatre", "Music Club"]);
    let genres = GENRES.choose(rng).copied().unwrap_or_default();

    into_record(json!({
        "title": format!("{title} {}", rng.gen_range(0..1000)),
        "artistId": rng.gen_range(1..=10),
        "venue": venue,
        "date": iso_in_days(rng.gen_range(0..365)),
        "price": rng.gen_range(500..5_500),
        "availableTickets": rng.gen_range(0..50_000),
        "isSoldOut": rng.gen_bool(0.3),
        "genres": genres,
        "description": format!("Amazing concert at {venue}"),
    }))
}

fn build_concert(body: &Record) -> Record {
    into_record(json!({
        "title": raw(body, "title"),
        "artistId": reference(body, "artistId"),
        "venue": raw(body, "venue"),
        "date": raw(body, "date"),
        "price": number_or(body, "price", 0.0),
        "availableTickets": number_or(body, "availableTickets", 0.0),
        "isSoldOut": flag(body, "isSoldOut", false),
        "genres": list(body, "genres"),
        "description": text(body, "description"),
    }))
}

fn random_tour(rng: &mut dyn RngCore) -> Record {
    const SERVICES: [&[&str]; 4] = [
        &["Flight", "Accommodation", "Breakfast"],
        &["Flight", "Transfer", "Excursions", "Meals"],
        &["Accommodation", "Breakfast", "Insurance"],
        &["Flight", "Accommodation", "Full Board", "Excursions"],
    ];

    let destination = pick(rng, &["Paris, France", "Barcelona, Spain", "Dubai, UAE", "Maldives", "Bali, Indonesia", "Prague, Czech Republic"]);
    let title = pick(rng, &["Summer Holiday", "Weekend in", "Journey to", "Sightseeing Tour", "Beach Paradise"]);
    let services = SERVICES.choose(rng).copied().unwrap_or_default();
    let city = destination.split(',').next().unwrap_or(destination);
    let departure = rng.gen_range(30..210);
    let duration = rng.gen_range(3..17);

    into_record(json!({
        "title": format!("{title} {city}"),
        "destination": destination,
        "hotelId": rng.gen_range(1..=10),
        "departureDate": iso_in_days(departure),
        "returnDate": iso_in_days(departure + duration),
        "price": rng.gen_range(30_000..180_000),
        "availableSeats": rng.gen_range(5..35),
        "isAvailable": rng.gen_bool(0.8),
        "includedServices": services,
        "rating": rating(rng),
        "duration": duration,
        "description": format!("Exciting journey to {destination}"),
    }))
}

fn build_tour(body: &Record) -> Record {
    into_record(json!({
        "title": raw(body, "title"),
        "destination": raw(body, "destination"),
        "hotelId": reference(body, "hotelId"),
        "departureDate": raw(body, "departureDate"),
        "returnDate": raw(body, "returnDate"),
        "price": number_or(body, "price", 0.0),
        "availableSeats": number_or(body, "availableSeats", 0.0),
        "isAvailable": flag(body, "isAvailable", true),
        "includedServices": list(body, "includedServices"),
        "rating": number_or(body, "rating", 0.0),
        "duration": number_or(body, "duration", 0.0),
        "description": text(body, "description"),
    }))
}

/// Asking for more seats than remain closes the tour.
fn flag_overbooked(existing: &Record, body: &Record, updates: &mut Record) {
    let Some(delta) = body.get("availableSeats") else {
        return;
    };
    if number(existing.get("availableSeats")) + number(Some(delta)) < 0.0 {
        updates.insert("isAvailable".to_string(), Value::Bool(false));
    }
}

fn random_product(rng: &mut dyn RngCore) -> Record {
    let name = pick(rng, &["Face Cream", "Serum", "Foundation", "Lipstick", "Shampoo", "Conditioner", "Face Mask", "Body Scrub"]);
    let category = pick(rng, &["Face Care", "Makeup", "Hair Care", "Body Care", "Perfume"]);
    let ingredient_count = rng.gen_range(3..=5);
    let ingredients = sample(
        rng,
        &["Hyaluronic Acid", "Vitamin C", "Retinol", "Collagen", "Aloe Vera", "Shea Butter", "Panthenol", "Niacinamide", "Ceramides", "Peptides"],
        ingredient_count,
    );
    let years: i64 = rng.gen_range(1..=3);
    let volume = [30, 50, 100, 150, 250][rng.gen_range(0..5)];

    into_record(json!({
        "name": format!("{name} {}", rng.gen_range(0..100)),
        "brandId": rng.gen_range(1..=10),
        "category": category,
        "price": rng.gen_range(500..5_500),
        "stock": rng.gen_range(0..100),
        "isAvailable": rng.gen_bool(0.8),
        "expiryDate": iso_in_days(years * 365),
        "ingredients": ingredients,
        "volume": volume,
        "rating": rating(rng),
        "description": format!("Quality {} from a trusted maker", name.to_lowercase()),
    }))
}

fn build_product(body: &Record) -> Record {
    let expiry = if truthy(body.get("expiryDate")) {
        raw(body, "expiryDate")
    } else {
        Value::from(iso_in_days(365))
    };

    into_record(json!({
        "name": raw(body, "name"),
        "brandId": reference(body, "brandId"),
        "category": raw(body, "category"),
        "price": number_or(body, "price", 0.0),
        "stock": number_or(body, "stock", 0.0),
        "isAvailable": flag(body, "isAvailable", true),
        "expiryDate": expiry,
        "ingredients": list(body, "ingredients"),
        "volume": number_or(body, "volume", 0.0),
        "rating": number_or(body, "rating", 0.0),
        "description": text(body, "description"),
    }))
}

/// Empty stock makes a product unavailable; restocking from zero restores it.
fn flag_in_stock(existing: &Record, _body: &Record, updates: &mut Record) {
    let Some(stock) = updates.get("stock").map(|v| number(Some(v))) else {
        return;
    };
    if stock == 0.0 {
        updates.insert("isAvailable".to_string(), Value::Bool(false));
    } else if number(existing.get("stock")) == 0.0 {
        updates.insert("isAvailable".to_string(), Value::Bool(true));
    }
}
