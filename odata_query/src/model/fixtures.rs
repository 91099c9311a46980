//! Shared test model

use crate::model::InMemoryModel;

pub const SALES_MODEL_JSON: &str = r#"{
  "schemas": [
    {
      "namespace": "Sales",
      "entityTypes": [
        {
          "name": "Customer",
          "key": ["ID"],
          "properties": [
            { "name": "ID", "type": "Edm.Int32", "nullable": false, "annotations": ["Core.Computed"] },
            { "name": "Name", "type": "Edm.String" },
            { "name": "Email", "type": "Edm.String" },
            { "name": "BirthDate", "type": "Edm.Date" },
            { "name": "Address", "type": "Sales.Address" },
            { "name": "PreviousAddresses", "type": "Collection(Sales.Address)" },
            { "name": "Tags", "type": "Collection(Edm.String)" },
            { "name": "FavoriteColor", "type": "Sales.Color" }
          ],
          "navigationProperties": [
            { "name": "Orders", "type": "Collection(Sales.Order)", "partner": "Customer" },
            { "name": "BestFriend", "type": "Sales.Customer" }
          ]
        },
        {
          "name": "VipCustomer",
          "baseType": "Sales.Customer",
          "properties": [
            { "name": "Level", "type": "Edm.Int32" }
          ]
        },
        {
          "name": "Order",
          "key": ["ID"],
          "properties": [
            { "name": "ID", "type": "Edm.Int32", "nullable": false },
            { "name": "Amount", "type": "Edm.Decimal" },
            { "name": "Quantity", "type": "Edm.Int32" },
            { "name": "OrderDate", "type": "Edm.DateTimeOffset" },
            { "name": "ShipDate", "type": "Edm.Date" }
          ],
          "navigationProperties": [
            { "name": "Customer", "type": "Sales.Customer", "nullable": false, "partner": "Orders" },
            { "name": "Product", "type": "Sales.Product" }
          ]
        },
        {
          "name": "Product",
          "key": ["ID"],
          "properties": [
            { "name": "ID", "type": "Edm.Int32", "nullable": false },
            { "name": "Name", "type": "Edm.String" },
            { "name": "Price", "type": "Edm.Double" },
            { "name": "Category", "type": "Edm.String" },
            { "name": "Color", "type": "Sales.Color" }
          ]
        },
        {
          "name": "Sale",
          "key": ["ID"],
          "open": true,
          "properties": [
            { "name": "ID", "type": "Edm.Int32", "nullable": false },
            { "name": "Amount", "type": "Edm.Decimal" },
            { "name": "Region", "type": "Edm.String" }
          ],
          "navigationProperties": [
            { "name": "Product", "type": "Sales.Product" }
          ]
        }
      ],
      "complexTypes": [
        {
          "name": "Address",
          "properties": [
            { "name": "Street", "type": "Edm.String" },
            { "name": "City", "type": "Edm.String" },
            { "name": "Country", "type": "Edm.String" }
          ]
        }
      ],
      "enumTypes": [
        {
          "name": "Color",
          "isFlags": true,
          "members": [
            { "name": "Red", "value": 1 },
            { "name": "Green", "value": 2 },
            { "name": "Blue", "value": 4 }
          ]
        }
      ],
      "entitySets": [
        { "name": "Customers", "entityType": "Sales.Customer" },
        { "name": "Orders", "entityType": "Sales.Order" },
        { "name": "Products", "entityType": "Sales.Product" },
        { "name": "Sales", "entityType": "Sales.Sale" }
      ],
      "associations": [
        {
          "name": "CustomerOrders",
          "end1": { "role": "Customer", "type": "Sales.Customer", "multiplicity": "1" },
          "end2": { "role": "Orders", "type": "Sales.Order", "multiplicity": "*" }
        }
      ],
      "associationSets": [
        {
          "name": "CustomerOrdersSet",
          "association": "Sales.CustomerOrders",
          "end1": { "role": "Customer", "entitySet": "Customers" },
          "end2": { "entitySet": "Orders" }
        }
      ],
      "operations": [
        {
          "name": "DiscountedPrice",
          "isBound": true,
          "parameters": [
            { "name": "product", "type": "Sales.Product" },
            { "name": "percent", "type": "Edm.Int32" }
          ],
          "returnType": "Edm.Double"
        },
        {
          "name": "TotalSpent",
          "isBound": true,
          "parameters": [
            { "name": "customer", "type": "Sales.Customer" }
          ],
          "returnType": "Edm.Decimal"
        },
        {
          "name": "TopCustomers",
          "parameters": [
            { "name": "count", "type": "Edm.Int32" }
          ],
          "returnType": "Collection(Sales.Customer)"
        }
      ]
    }
  ]
}"#;

pub fn sales_model() -> InMemoryModel {
    match InMemoryModel::from_json_str(SALES_MODEL_JSON) {
        Ok(model) => model,
        Err(error) => panic!("sales fixture does not load: {}", error),
    }
}
