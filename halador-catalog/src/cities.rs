//! Known Peru intercity origins/destinations with driver map coordinates.
//! Publishing against an unknown city still works, it just ships without
//! coordinates.

pub struct City {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

pub const PERU_CITIES: &[City] = &[
    City { name: "Lima", lat: -12.0464, lng: -77.0428 },
    City { name: "Arequipa", lat: -16.4090, lng: -71.5375 },
    City { name: "Cusco", lat: -13.5319, lng: -71.9675 },
    City { name: "Trujillo", lat: -8.1120, lng: -79.0288 },
    City { name: "Chiclayo", lat: -6.7714, lng: -79.8409 },
    City { name: "Piura", lat: -5.1945, lng: -80.6328 },
    City { name: "Iquitos", lat: -3.7437, lng: -73.2516 },
    City { name: "Huancayo", lat: -12.0651, lng: -75.2049 },
    City { name: "Tacna", lat: -18.0147, lng: -70.2536 },
    City { name: "Ica", lat: -14.0678, lng: -75.7286 },
    City { name: "Juliaca", lat: -15.4997, lng: -70.1333 },
    City { name: "Puno", lat: -15.8402, lng: -70.0219 },
    City { name: "Pucallpa", lat: -8.3791, lng: -74.5539 },
    City { name: "Chimbote", lat: -9.0745, lng: -78.5936 },
    City { name: "Ayacucho", lat: -13.1588, lng: -74.2232 },
    City { name: "Cajamarca", lat: -7.1638, lng: -78.5003 },
];

pub fn find(name: &str) -> Option<&'static City> {
    PERU_CITIES.iter().find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}
